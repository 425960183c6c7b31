//! What a transform hands back to the overwrite, and what the overwrite
//! reports to its caller.

use crate::models::object::Metadata;
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Content chosen by a transform to replace the object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    /// Local file whose bytes become the new object content. May be the
    /// snapshot's own local copy.
    pub path: PathBuf,

    /// Remove `path` once the overwrite finishes. Ignored when `path` is the
    /// snapshot's local copy, which is always removed by the overwrite itself.
    pub dispose: bool,

    /// User metadata written with the new content.
    pub metadata: Metadata,
}

/// A transform's verdict on the object it was shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverwriteDecision {
    /// Leave the object alone. No further store calls are made.
    Skip,
    /// Write the replacement, carrying every preserved attribute forward.
    Write(Replacement),
}

impl OverwriteDecision {
    pub fn skip() -> Self {
        OverwriteDecision::Skip
    }

    /// Rewrite the original bytes (typically to change metadata or the ACL).
    pub fn keep_content(local_copy: &Path, metadata: Metadata) -> Self {
        OverwriteDecision::Write(Replacement {
            path: local_copy.to_path_buf(),
            dispose: false,
            metadata,
        })
    }

    /// Upload `path`, leaving the file in place afterwards.
    pub fn replace(path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        OverwriteDecision::Write(Replacement {
            path: path.into(),
            dispose: false,
            metadata,
        })
    }

    /// Upload `path` and delete it when the overwrite finishes, whatever the
    /// outcome.
    pub fn replace_and_dispose(path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        OverwriteDecision::Write(Replacement {
            path: path.into(),
            dispose: true,
            metadata,
        })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, OverwriteDecision::Skip)
    }
}

/// Successful end state of an overwrite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverwriteOutcome {
    /// The transform declined; the object is untouched.
    Skipped,
    /// New content was written.
    Written {
        e_tag: Option<String>,
        version_id: Option<String>,
        /// A follow-up permission update restored a WRITE grant.
        permissions_restored: bool,
    },
}

impl OverwriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, OverwriteOutcome::Written { .. })
    }
}

/// Steps of the overwrite state machine that can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverwritePhase {
    Fetching,
    Deciding,
    AttributeGathering,
    Writing,
    RestoringWriteGrant,
}

impl fmt::Display for OverwritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverwritePhase::Fetching => "fetching",
            OverwritePhase::Deciding => "deciding",
            OverwritePhase::AttributeGathering => "attribute-gathering",
            OverwritePhase::Writing => "writing",
            OverwritePhase::RestoringWriteGrant => "restoring-write-grant",
        };
        f.write_str(name)
    }
}
