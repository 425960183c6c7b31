//! Access-control grants and canned ACLs.

use crate::errors::ParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Group granting access to everyone, including anonymous requests.
pub const ALL_USERS_GROUP: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Group granting access to any authenticated account.
pub const AUTHENTICATED_USERS_GROUP: &str =
    "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

/// Group used by server access logging.
pub const LOG_DELIVERY_GROUP: &str = "http://acs.amazonaws.com/groups/s3/LogDelivery";

/// Permission carried by a single grant.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Read,
    ReadAcp,
    WriteAcp,
    Write,
    FullControl,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::Read,
        Permission::ReadAcp,
        Permission::WriteAcp,
        Permission::Write,
        Permission::FullControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::ReadAcp => "READ_ACP",
            Permission::WriteAcp => "WRITE_ACP",
            Permission::Write => "WRITE",
            Permission::FullControl => "FULL_CONTROL",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| ParseError::UnknownPermission(s.to_string()))
    }
}

/// The party a grant applies to.
///
/// Exactly one identifier per grantee; the store's grant headers have no way
/// to express more than one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "type")]
pub enum Grantee {
    /// An account, addressed by its canonical id.
    CanonicalUser {
        id: String,
        display_name: Option<String>,
    },
    /// A predefined group, addressed by URI.
    Group { uri: String },
    /// An account, addressed by e-mail.
    Email { address: String },
}

impl Grantee {
    pub fn canonical_user(id: impl Into<String>) -> Self {
        Grantee::CanonicalUser {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn group(uri: impl Into<String>) -> Self {
        Grantee::Group { uri: uri.into() }
    }

    pub fn email(address: impl Into<String>) -> Self {
        Grantee::Email {
            address: address.into(),
        }
    }
}

/// A (grantee, permission) pair from an object's ACL.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: Permission,
}

impl Grant {
    pub fn new(grantee: Grantee, permission: Permission) -> Self {
        Self {
            grantee,
            permission,
        }
    }
}

/// Predefined ACLs accepted by the `x-amz-acl` header.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    AwsExecRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl CannedAcl {
    pub const ALL: [CannedAcl; 7] = [
        CannedAcl::Private,
        CannedAcl::PublicRead,
        CannedAcl::PublicReadWrite,
        CannedAcl::AuthenticatedRead,
        CannedAcl::AwsExecRead,
        CannedAcl::BucketOwnerRead,
        CannedAcl::BucketOwnerFullControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::AwsExecRead => "aws-exec-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CannedAcl {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        CannedAcl::ALL
            .into_iter()
            .find(|acl| acl.as_str() == normalized)
            .ok_or_else(|| ParseError::UnknownCannedAcl(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_parses_header_names() {
        assert_eq!("READ_ACP".parse::<Permission>(), Ok(Permission::ReadAcp));
        assert_eq!(
            "FULL_CONTROL".parse::<Permission>(),
            Ok(Permission::FullControl)
        );
        assert_eq!(
            "read".parse::<Permission>(),
            Err(ParseError::UnknownPermission("read".into()))
        );
    }

    #[test]
    fn permission_serde_uses_header_names() {
        let json = serde_json::to_string(&Permission::WriteAcp).unwrap();
        assert_eq!(json, "\"WRITE_ACP\"");
        let back: Permission = serde_json::from_str("\"FULL_CONTROL\"").unwrap();
        assert_eq!(back, Permission::FullControl);
    }

    #[test]
    fn canned_acl_round_trips_through_str() {
        for acl in CannedAcl::ALL {
            assert_eq!(acl.as_str().parse::<CannedAcl>(), Ok(acl));
        }
        assert_eq!(" Public-Read ".parse::<CannedAcl>(), Ok(CannedAcl::PublicRead));
        assert!("world-writable".parse::<CannedAcl>().is_err());
    }

    #[test]
    fn grantee_serializes_with_type_tag() {
        let grant = Grant::new(Grantee::group(ALL_USERS_GROUP), Permission::Read);
        let value = serde_json::to_value(&grant).unwrap();
        assert_eq!(value["grantee"]["type"], "Group");
        assert_eq!(value["grantee"]["uri"], ALL_USERS_GROUP);
        assert_eq!(value["permission"], "READ");
    }
}
