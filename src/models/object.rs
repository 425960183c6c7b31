//! Represents an object (file) as it was fetched from a bucket.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, pin::Pin};

/// User-defined metadata (`x-amz-meta-*`, without the prefix).
pub type Metadata = HashMap<String, String>;

/// Streaming object payload, as produced and consumed by store clients.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Descriptive headers a store drops on replace unless they are re-supplied.
///
/// Every field here is copied verbatim from the fetched object into the
/// replacing write.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectHeaders {
    /// Content type (MIME type).
    pub content_type: Option<String>,

    /// `Cache-Control` header value.
    pub cache_control: Option<String>,

    /// `Content-Disposition` header value.
    pub content_disposition: Option<String>,

    /// `Content-Encoding` header value.
    pub content_encoding: Option<String>,

    /// `Content-Language` header value.
    pub content_language: Option<String>,

    /// Redirect target when the bucket is served as a website.
    pub website_redirect_location: Option<String>,

    /// Storage class (e.g., STANDARD, STANDARD_IA).
    pub storage_class: Option<String>,
}

/// Snapshot of a single object taken right before it is overwritten.
///
/// A transform only ever sees this through a shared reference. The metadata
/// it wants written is handed to it as a separate owned copy.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectSnapshot {
    /// Bucket holding the object.
    pub bucket: String,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Descriptive headers carried into the replacing write.
    pub headers: ObjectHeaders,

    /// Size in bytes, as reported by the store.
    pub content_length: Option<i64>,

    /// Integrity tag reported by the store.
    pub e_tag: Option<String>,

    /// Timestamp when the object was last modified.
    pub last_modified: Option<DateTime<Utc>>,

    /// User metadata at fetch time.
    pub metadata: Metadata,

    /// Number of tags the store says the object carries.
    pub tag_count: Option<i32>,

    /// Version identifier if versioning is enabled.
    pub version_id: Option<String>,
}

impl ObjectSnapshot {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type.as_deref()
    }

    pub fn storage_class(&self) -> Option<&str> {
        self.headers.storage_class.as_deref()
    }

    /// Whether the tag set has to be fetched. An absent count means no tags.
    pub fn has_tags(&self) -> bool {
        self.tag_count.is_some_and(|count| count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag_count: Option<i32>) -> ObjectSnapshot {
        ObjectSnapshot {
            bucket: "test-bucket".into(),
            key: "test-key".into(),
            headers: ObjectHeaders {
                content_type: Some("text/plain".into()),
                ..ObjectHeaders::default()
            },
            content_length: Some(12),
            e_tag: None,
            last_modified: None,
            metadata: Metadata::new(),
            tag_count,
            version_id: None,
        }
    }

    #[test]
    fn tag_fetch_needed_only_for_positive_count() {
        assert!(!snapshot(None).has_tags());
        assert!(!snapshot(Some(0)).has_tags());
        assert!(snapshot(Some(2)).has_tags());
    }

    #[test]
    fn accessors_read_headers() {
        let snap = snapshot(None);
        assert_eq!(snap.content_type(), Some("text/plain"));
        assert_eq!(snap.storage_class(), None);
    }
}
