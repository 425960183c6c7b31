//! Grant headers (`x-amz-grant-read`, `x-amz-grant-write`, ...).
//!
//! Each header lists the grantees holding one permission, comma separated:
//! `id="..."` for canonical users, `uri="..."` for groups and
//! `emailaddress="..."` for e-mail grantees. Grantees appear in the order the
//! grants were listed.

use crate::{
    errors::ParseError,
    models::{
        acl::{Grant, Grantee, Permission},
        request::{PutObjectAclRequest, PutObjectRequest},
    },
};

/// Render one grantee in header form.
pub fn grantee_form(grantee: &Grantee) -> String {
    match grantee {
        Grantee::CanonicalUser { id, .. } => format!("id=\"{}\"", id),
        Grantee::Group { uri } => format!("uri=\"{}\"", uri),
        Grantee::Email { address } => format!("emailaddress=\"{}\"", address),
    }
}

/// Header value for every grant holding `permission`, or an empty string when
/// none does.
pub fn grant_string(grants: &[Grant], permission: Permission) -> String {
    grants
        .iter()
        .filter(|grant| grant.permission == permission)
        .map(|grant| grantee_form(&grant.grantee))
        .collect::<Vec<_>>()
        .join(",")
}

/// Like [`grant_string`], but `None` instead of an empty header.
fn grant_field(grants: &[Grant], permission: Permission) -> Option<String> {
    let value = grant_string(grants, permission);
    (!value.is_empty()).then_some(value)
}

pub fn has_write_grant(grants: &[Grant]) -> bool {
    grants
        .iter()
        .any(|grant| grant.permission == Permission::Write)
}

/// Fill the grant headers an object-creation request accepts.
///
/// WRITE is not among them; see [`permission_restore_request`].
pub fn apply_creation_grants(request: &mut PutObjectRequest, grants: &[Grant]) {
    request.grant_read = grant_field(grants, Permission::Read);
    request.grant_read_acp = grant_field(grants, Permission::ReadAcp);
    request.grant_write_acp = grant_field(grants, Permission::WriteAcp);
    request.grant_full_control = grant_field(grants, Permission::FullControl);
}

/// Build the permission update that puts the full grant set back, WRITE
/// included.
pub fn permission_restore_request(bucket: &str, key: &str, grants: &[Grant]) -> PutObjectAclRequest {
    PutObjectAclRequest {
        bucket: bucket.to_string(),
        key: key.to_string(),
        grant_read: grant_field(grants, Permission::Read),
        grant_read_acp: grant_field(grants, Permission::ReadAcp),
        grant_write_acp: grant_field(grants, Permission::WriteAcp),
        grant_write: grant_field(grants, Permission::Write),
        grant_full_control: grant_field(grants, Permission::FullControl),
    }
}

/// Parse a grant header back into grants for `permission`.
///
/// Accepts the format produced by [`grant_string`]; whitespace around the
/// separators is tolerated.
pub fn parse_grant_string(permission: Permission, header: &str) -> Result<Vec<Grant>, ParseError> {
    let invalid = || ParseError::InvalidGrantee(header.to_string());
    let mut grants = Vec::new();
    let mut rest = header.trim();

    while !rest.is_empty() {
        let (kind, after_kind) = rest.split_once('=').ok_or_else(invalid)?;
        let quoted = after_kind.trim_start().strip_prefix('"').ok_or_else(invalid)?;
        let (value, after_value) = quoted.split_once('"').ok_or_else(invalid)?;

        let grantee = match kind.trim().to_ascii_lowercase().as_str() {
            "id" => Grantee::canonical_user(value),
            "uri" => Grantee::group(value),
            "emailaddress" => Grantee::email(value),
            _ => return Err(invalid()),
        };
        grants.push(Grant::new(grantee, permission));

        let after_value = after_value.trim_start();
        rest = match after_value.strip_prefix(',') {
            Some(next) => next.trim_start(),
            None if after_value.is_empty() => after_value,
            None => return Err(invalid()),
        };
    }

    Ok(grants)
}
