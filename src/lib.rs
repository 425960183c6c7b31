//! Attribute-preserving overwrites for S3-style object stores.
//!
//! Writing an object replaces it wholesale: ACL grants, tags, descriptive
//! headers and metadata that are not re-sent are gone. [`OverwriteService`]
//! snapshots the object, lets a transform decide on new content, and writes it
//! back with everything the old object carried, restoring a WRITE grant in a
//! second call when the original ACL had one.
//!
//! ```no_run
//! use object_overwrite::{MemoryObjectStore, OverwriteConfig, OverwriteDecision, OverwriteService};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryObjectStore::new());
//! let service = OverwriteService::new(store, OverwriteConfig::from_env()?);
//! service
//!     .overwrite_preserving_acl("bucket", "notes.txt", |_snapshot, local, mut metadata| {
//!         let text = std::fs::read_to_string(local)?;
//!         let upper = local.with_extension("upper");
//!         std::fs::write(&upper, text.to_uppercase())?;
//!         metadata.insert("case".into(), "upper".into());
//!         Ok(OverwriteDecision::replace_and_dispose(upper, metadata))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod encoding;
pub mod errors;
pub mod models;
pub mod services;

pub use config::OverwriteConfig;
pub use errors::{
    FetchTarget, ObjectState, OverwriteError, ParseError, StoreError, StoreResult,
};
pub use models::{
    acl::{CannedAcl, Grant, Grantee, Permission},
    decision::{OverwriteDecision, OverwriteOutcome, OverwritePhase, Replacement},
    object::{ByteStream, Metadata, ObjectHeaders, ObjectSnapshot},
    request::{GetObjectOutput, PutObjectAclRequest, PutObjectOutput, PutObjectRequest},
    tagging::Tag,
};
pub use services::{
    memory_store::{MemoryObjectStore, StoreCall, StoreOperation, StoredObject},
    overwrite_service::{OverwriteService, overwrite_preserving_acl, overwrite_with_simple_acl},
    store_client::ObjectStoreClient,
};
