use crate::models::decision::OverwritePhase;
use std::{fmt, io};
use thiserror::Error;

/// Failure reported by a store client for a single call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Malformed ACL, permission or tagging text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown permission `{0}`")]
    UnknownPermission(String),
    #[error("unknown canned ACL `{0}`")]
    UnknownCannedAcl(String),
    #[error("malformed grantee list `{0}`")]
    InvalidGrantee(String),
    #[error("malformed tagging `{0}`")]
    InvalidTagging(String),
}

/// Which read produced a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTarget {
    Object,
    LocalCopy,
    Tags,
    Acl,
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchTarget::Object => "object",
            FetchTarget::LocalCopy => "local copy",
            FetchTarget::Tags => "tags",
            FetchTarget::Acl => "ACL",
        };
        f.write_str(name)
    }
}

/// State of the stored object after a failed overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// No write was attempted.
    Unchanged,
    /// The write was attempted and failed; the store decides what remains.
    Indeterminate,
    /// New content is in place, but the original WRITE grant is missing.
    ContentUpdatedPermissionsStale,
}

/// Failure of an attribute-preserving overwrite, tagged with the phase that
/// produced it.
#[derive(Debug, Error)]
pub enum OverwriteError {
    #[error("failed to fetch {target} for `{bucket}/{key}`: {source}")]
    Fetch {
        bucket: String,
        key: String,
        target: FetchTarget,
        #[source]
        source: StoreError,
    },
    #[error("transform failed for `{bucket}/{key}`: {source}")]
    Callback {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to write `{bucket}/{key}`: {source}")]
    Write {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },
    #[error(
        "content of `{bucket}/{key}` was replaced but its WRITE grant could not be restored: {source}"
    )]
    PermissionRestore {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },
}

impl OverwriteError {
    pub(crate) fn fetch(bucket: &str, key: &str, target: FetchTarget, source: StoreError) -> Self {
        OverwriteError::Fetch {
            bucket: bucket.to_string(),
            key: key.to_string(),
            target,
            source,
        }
    }

    pub(crate) fn callback(bucket: &str, key: &str, source: anyhow::Error) -> Self {
        OverwriteError::Callback {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn write(bucket: &str, key: &str, source: StoreError) -> Self {
        OverwriteError::Write {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn permission_restore(bucket: &str, key: &str, source: StoreError) -> Self {
        OverwriteError::PermissionRestore {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }

    /// The state machine step that failed.
    pub fn phase(&self) -> OverwritePhase {
        match self {
            OverwriteError::Fetch {
                target: FetchTarget::Object | FetchTarget::LocalCopy,
                ..
            } => OverwritePhase::Fetching,
            OverwriteError::Fetch { .. } => OverwritePhase::AttributeGathering,
            OverwriteError::Callback { .. } => OverwritePhase::Deciding,
            OverwriteError::Write { .. } => OverwritePhase::Writing,
            OverwriteError::PermissionRestore { .. } => OverwritePhase::RestoringWriteGrant,
        }
    }

    /// What the failure means for the object in the store.
    pub fn object_state(&self) -> ObjectState {
        match self {
            OverwriteError::Fetch { .. } | OverwriteError::Callback { .. } => {
                ObjectState::Unchanged
            }
            OverwriteError::Write { .. } => ObjectState::Indeterminate,
            OverwriteError::PermissionRestore { .. } => {
                ObjectState::ContentUpdatedPermissionsStale
            }
        }
    }

    /// The store error behind this failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            OverwriteError::Fetch { source, .. }
            | OverwriteError::Write { source, .. }
            | OverwriteError::PermissionRestore { source, .. } => Some(source),
            OverwriteError::Callback { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.store_error(), Some(StoreError::Cancelled))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.store_error(), Some(StoreError::NotFound { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn phase_follows_failing_step() {
        let tags = OverwriteError::fetch("b", "k", FetchTarget::Tags, StoreError::Cancelled);
        assert_eq!(tags.phase(), OverwritePhase::AttributeGathering);

        let object = OverwriteError::fetch(
            "b",
            "k",
            FetchTarget::Object,
            StoreError::NotFound {
                bucket: "b".into(),
                key: "k".into(),
            },
        );
        assert_eq!(object.phase(), OverwritePhase::Fetching);
        assert!(object.is_not_found());

        let restore =
            OverwriteError::permission_restore("b", "k", StoreError::AccessDenied("no".into()));
        assert_eq!(restore.phase(), OverwritePhase::RestoringWriteGrant);
    }

    #[test]
    fn partial_success_is_distinguishable() {
        let callback = OverwriteError::callback("b", "k", anyhow::anyhow!("bad json"));
        assert_eq!(callback.object_state(), ObjectState::Unchanged);
        assert!(callback.store_error().is_none());

        let write = OverwriteError::write("b", "k", StoreError::InvalidRequest("x".into()));
        assert_eq!(write.object_state(), ObjectState::Indeterminate);

        let restore = OverwriteError::permission_restore("b", "k", StoreError::Cancelled);
        assert_eq!(
            restore.object_state(),
            ObjectState::ContentUpdatedPermissionsStale
        );
        assert!(restore.is_cancelled());
        assert!(restore.to_string().contains("WRITE grant"));
    }

    #[test]
    fn source_chain_is_kept() {
        let err = OverwriteError::callback("b", "k", anyhow::anyhow!("bad json"));
        let source = err.source().expect("callback error has a source");
        assert_eq!(source.to_string(), "bad json");
    }
}
