//! Request and response shapes for the five store operations an overwrite
//! depends on.
//!
//! The creation request and the permission-update request are separate types
//! on purpose: only the permission update can carry a WRITE grant.

use crate::models::{
    acl::CannedAcl,
    object::{ByteStream, Metadata, ObjectHeaders},
};
use chrono::{DateTime, Utc};
use std::fmt;

/// Result of a get-object call: the payload stream plus its attributes.
pub struct GetObjectOutput {
    pub body: ByteStream,
    pub headers: ObjectHeaders,
    pub content_length: Option<i64>,
    pub e_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: Metadata,
    pub tag_count: Option<i32>,
    pub version_id: Option<String>,
}

impl fmt::Debug for GetObjectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetObjectOutput")
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .field("e_tag", &self.e_tag)
            .field("last_modified", &self.last_modified)
            .field("metadata", &self.metadata)
            .field("tag_count", &self.tag_count)
            .field("version_id", &self.version_id)
            .finish_non_exhaustive()
    }
}

/// A full object write (create or replace).
///
/// Grant fields hold the store's grantee-string format; `None` means the
/// header is not sent at all.
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: ByteStream,
    pub content_length: Option<i64>,
    pub headers: ObjectHeaders,
    pub metadata: Metadata,
    /// Query-string encoded tag set (`k=v&k=v`).
    pub tagging: Option<String>,
    pub acl: Option<CannedAcl>,
    pub grant_read: Option<String>,
    pub grant_read_acp: Option<String>,
    pub grant_write_acp: Option<String>,
    pub grant_full_control: Option<String>,
}

impl PutObjectRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, body: ByteStream) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            content_length: None,
            headers: ObjectHeaders::default(),
            metadata: Metadata::new(),
            tagging: None,
            acl: None,
            grant_read: None,
            grant_read_acp: None,
            grant_write_acp: None,
            grant_full_control: None,
        }
    }

    pub fn has_explicit_grants(&self) -> bool {
        self.grant_read.is_some()
            || self.grant_read_acp.is_some()
            || self.grant_write_acp.is_some()
            || self.grant_full_control.is_some()
    }
}

impl fmt::Debug for PutObjectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutObjectRequest")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("content_length", &self.content_length)
            .field("headers", &self.headers)
            .field("metadata", &self.metadata)
            .field("tagging", &self.tagging)
            .field("acl", &self.acl)
            .field("grant_read", &self.grant_read)
            .field("grant_read_acp", &self.grant_read_acp)
            .field("grant_write_acp", &self.grant_write_acp)
            .field("grant_full_control", &self.grant_full_control)
            .finish_non_exhaustive()
    }
}

/// What the store returns for a successful write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutObjectOutput {
    pub e_tag: Option<String>,
    pub version_id: Option<String>,
}

/// A permission update on an existing object, explicit grants only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutObjectAclRequest {
    pub bucket: String,
    pub key: String,
    pub grant_read: Option<String>,
    pub grant_read_acp: Option<String>,
    pub grant_write_acp: Option<String>,
    pub grant_write: Option<String>,
    pub grant_full_control: Option<String>,
}
