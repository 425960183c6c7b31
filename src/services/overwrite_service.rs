//! OverwriteService: replace an object's content without losing the
//! attributes a plain write would drop.
//!
//! An overwrite runs these steps, each awaited before the next:
//!
//! 1. **Fetching**: download the object into a private local copy.
//! 2. **Deciding**: hand the snapshot to the caller's transform.
//!    [`OverwriteDecision::Skip`] ends the overwrite here.
//! 3. **AttributeGathering**: read the tag set (only when the object reports
//!    tags) and, when preserving the ACL, the current grants.
//! 4. **Writing**: one put-object carrying the new content, every descriptive
//!    header, the transform's metadata, the tags and the ACL.
//! 5. **RestoringWriteGrant**: when the original ACL held a WRITE grant, a
//!    put-object-acl puts the complete grant set back. Object creation does
//!    not accept WRITE, so it cannot travel with step 4.

use crate::{
    config::OverwriteConfig,
    encoding::{
        grants::{apply_creation_grants, has_write_grant, permission_restore_request},
        tagging::tagging_field,
    },
    errors::{FetchTarget, OverwriteError},
    models::{
        acl::{CannedAcl, Grant},
        decision::{OverwriteDecision, OverwriteOutcome, OverwritePhase, Replacement},
        object::{Metadata, ObjectSnapshot},
        request::{PutObjectAclRequest, PutObjectOutput, PutObjectRequest},
    },
    services::{
        snapshot::fetch_snapshot,
        store_client::{ObjectStoreClient, until_cancelled},
    },
};
use anyhow::Context as _;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs::File;
use tokio_util::{io::ReaderStream, sync::CancellationToken};
use tracing::{debug, info, instrument, warn};

/// How the replacing write gets its ACL.
#[derive(Debug, Clone, Copy)]
enum AclMode {
    /// Copy the object's current grants.
    PreserveExisting,
    /// Apply a canned ACL instead.
    Canned(CannedAcl),
}

/// ACL attached to the put-object request.
enum CreationAcl {
    Grants(Vec<Grant>),
    Canned(CannedAcl),
}

/// Whether a permission update must follow the write. Decided once, right
/// after the original grants are read.
#[derive(Debug)]
enum WritePlan {
    WriteOnly,
    WriteThenRestorePermissions(PutObjectAclRequest),
}

impl WritePlan {
    fn for_grants(bucket: &str, key: &str, grants: &[Grant]) -> Self {
        if has_write_grant(grants) {
            WritePlan::WriteThenRestorePermissions(permission_restore_request(bucket, key, grants))
        } else {
            WritePlan::WriteOnly
        }
    }
}

/// Removes a disposable replacement file when the overwrite ends, on every
/// exit path.
struct Disposal(Option<PathBuf>);

impl Disposal {
    fn new(replacement: &Replacement, local_copy: &Path) -> Self {
        let disposable = replacement.dispose && replacement.path != local_copy;
        Self(disposable.then(|| replacement.path.clone()))
    }
}

impl Drop for Disposal {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("removed replacement file {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("replacement file {} already missing", path.display());
                }
                Err(err) => debug!(
                    "failed to remove replacement file {}: {}",
                    path.display(),
                    err
                ),
            }
        }
    }
}

/// Runs attribute-preserving overwrites against one store client.
///
/// Overwrites are independent: nothing is cached between calls, and two
/// concurrent overwrites of the same key are not coordinated (the store's
/// last writer wins).
#[derive(Clone)]
pub struct OverwriteService<C> {
    client: C,
    config: OverwriteConfig,
    cancel: CancellationToken,
}

impl<C: ObjectStoreClient> OverwriteService<C> {
    pub fn new(client: C, config: OverwriteConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop issuing store calls once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &OverwriteConfig {
        &self.config
    }

    /// Overwrite `bucket/key`, keeping its current ACL, tags, headers and
    /// (transform-adjusted) metadata.
    #[instrument(skip(self, transform), fields(mode = "preserve-acl"))]
    pub async fn overwrite_preserving_acl<F>(
        &self,
        bucket: &str,
        key: &str,
        transform: F,
    ) -> Result<OverwriteOutcome, OverwriteError>
    where
        F: FnOnce(&ObjectSnapshot, &Path, Metadata) -> anyhow::Result<OverwriteDecision>,
    {
        self.run(bucket, key, AclMode::PreserveExisting, transform)
            .await
    }

    /// Overwrite `bucket/key` with `acl` in place of its current grants,
    /// keeping tags, headers and (transform-adjusted) metadata.
    #[instrument(skip(self, transform), fields(mode = "canned-acl"))]
    pub async fn overwrite_with_simple_acl<F>(
        &self,
        bucket: &str,
        key: &str,
        acl: CannedAcl,
        transform: F,
    ) -> Result<OverwriteOutcome, OverwriteError>
    where
        F: FnOnce(&ObjectSnapshot, &Path, Metadata) -> anyhow::Result<OverwriteDecision>,
    {
        self.run(bucket, key, AclMode::Canned(acl), transform).await
    }

    async fn run<F>(
        &self,
        bucket: &str,
        key: &str,
        mode: AclMode,
        transform: F,
    ) -> Result<OverwriteOutcome, OverwriteError>
    where
        F: FnOnce(&ObjectSnapshot, &Path, Metadata) -> anyhow::Result<OverwriteDecision>,
    {
        debug!(phase = %OverwritePhase::Fetching, "fetching object");
        let (snapshot, local) =
            fetch_snapshot(&self.client, &self.config, &self.cancel, bucket, key).await?;

        debug!(phase = %OverwritePhase::Deciding, "invoking transform");
        let decision = transform(&snapshot, local.path(), snapshot.metadata.clone())
            .map_err(|source| OverwriteError::callback(bucket, key, source))?;

        let replacement = match decision {
            OverwriteDecision::Skip => {
                info!("transform declined; {}/{} left unchanged", bucket, key);
                return Ok(OverwriteOutcome::Skipped);
            }
            OverwriteDecision::Write(replacement) => replacement,
        };
        let _disposal = Disposal::new(&replacement, local.path());

        debug!(phase = %OverwritePhase::AttributeGathering, "collecting attributes");
        let tagging = self.fetch_tagging(&snapshot).await?;
        let (acl, plan) = match mode {
            AclMode::Canned(acl) => (CreationAcl::Canned(acl), WritePlan::WriteOnly),
            AclMode::PreserveExisting => {
                let grants = self.fetch_grants(bucket, key).await?;
                let plan = WritePlan::for_grants(bucket, key, &grants);
                (CreationAcl::Grants(grants), plan)
            }
        };

        debug!(phase = %OverwritePhase::Writing, "writing replacement");
        let request = build_put_request(&snapshot, replacement, tagging, acl)
            .await
            .map_err(|source| OverwriteError::callback(bucket, key, source))?;
        let output = self.write(request).await?;

        let permissions_restored = match plan {
            WritePlan::WriteOnly => false,
            WritePlan::WriteThenRestorePermissions(request) => {
                debug!(phase = %OverwritePhase::RestoringWriteGrant, "restoring WRITE grant");
                self.restore_permissions(request).await?;
                true
            }
        };

        info!(
            "overwrote {}/{} (permissions restored: {})",
            bucket, key, permissions_restored
        );
        Ok(OverwriteOutcome::Written {
            e_tag: output.e_tag,
            version_id: output.version_id,
            permissions_restored,
        })
    }

    /// Tag set as a tagging header, or `None` when there is nothing to send.
    ///
    /// The snapshot's tag count gates the call: an object reporting no tags is
    /// not asked for them.
    async fn fetch_tagging(
        &self,
        snapshot: &ObjectSnapshot,
    ) -> Result<Option<String>, OverwriteError> {
        if !snapshot.has_tags() {
            debug!("object reports no tags; skipping tag fetch");
            return Ok(None);
        }

        let tags = until_cancelled(
            &self.cancel,
            self.client
                .get_object_tagging(&snapshot.bucket, &snapshot.key),
        )
        .await
        .map_err(|source| {
            OverwriteError::fetch(&snapshot.bucket, &snapshot.key, FetchTarget::Tags, source)
        })?;

        Ok(tagging_field(&tags))
    }

    async fn fetch_grants(&self, bucket: &str, key: &str) -> Result<Vec<Grant>, OverwriteError> {
        until_cancelled(&self.cancel, self.client.get_object_acl(bucket, key))
            .await
            .map_err(|source| OverwriteError::fetch(bucket, key, FetchTarget::Acl, source))
    }

    async fn write(&self, request: PutObjectRequest) -> Result<PutObjectOutput, OverwriteError> {
        let (bucket, key) = (request.bucket.clone(), request.key.clone());
        until_cancelled(&self.cancel, self.client.put_object(request))
            .await
            .map_err(|source| OverwriteError::write(&bucket, &key, source))
    }

    async fn restore_permissions(&self, request: PutObjectAclRequest) -> Result<(), OverwriteError> {
        let (bucket, key) = (request.bucket.clone(), request.key.clone());
        until_cancelled(&self.cancel, self.client.put_object_acl(request))
            .await
            .map_err(|source| {
                warn!(
                    "content of {}/{} replaced but WRITE grant not restored: {}",
                    bucket, key, source
                );
                OverwriteError::permission_restore(&bucket, &key, source)
            })
    }
}

/// Assemble the replacing write: new content, carried-over headers, the
/// transform's metadata, tags and ACL.
///
/// Fails only when the replacement file cannot be opened.
async fn build_put_request(
    snapshot: &ObjectSnapshot,
    replacement: Replacement,
    tagging: Option<String>,
    acl: CreationAcl,
) -> anyhow::Result<PutObjectRequest> {
    let file = File::open(&replacement.path).await.with_context(|| {
        format!(
            "opening replacement content {}",
            replacement.path.display()
        )
    })?;
    let content_length = file
        .metadata()
        .await
        .with_context(|| format!("reading size of {}", replacement.path.display()))?
        .len();

    let mut request = PutObjectRequest::new(
        snapshot.bucket.clone(),
        snapshot.key.clone(),
        Box::pin(ReaderStream::new(file)),
    );
    request.content_length = Some(content_length as i64);
    request.headers = snapshot.headers.clone();
    request.metadata = replacement.metadata;
    request.tagging = tagging;

    match acl {
        CreationAcl::Canned(canned) => request.acl = Some(canned),
        CreationAcl::Grants(grants) => apply_creation_grants(&mut request, &grants),
    }

    Ok(request)
}

/// Overwrite `bucket/key` through `client` with default settings, keeping the
/// object's ACL.
pub async fn overwrite_preserving_acl<C, F>(
    client: C,
    bucket: &str,
    key: &str,
    transform: F,
) -> Result<OverwriteOutcome, OverwriteError>
where
    C: ObjectStoreClient,
    F: FnOnce(&ObjectSnapshot, &Path, Metadata) -> anyhow::Result<OverwriteDecision>,
{
    OverwriteService::new(client, OverwriteConfig::default())
        .overwrite_preserving_acl(bucket, key, transform)
        .await
}

/// Overwrite `bucket/key` through `client` with default settings, applying
/// `acl`.
pub async fn overwrite_with_simple_acl<C, F>(
    client: C,
    bucket: &str,
    key: &str,
    acl: CannedAcl,
    transform: F,
) -> Result<OverwriteOutcome, OverwriteError>
where
    C: ObjectStoreClient,
    F: FnOnce(&ObjectSnapshot, &Path, Metadata) -> anyhow::Result<OverwriteDecision>,
{
    OverwriteService::new(client, OverwriteConfig::default())
        .overwrite_with_simple_acl(bucket, key, acl, transform)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::acl::{ALL_USERS_GROUP, Grantee, Permission};

    #[test]
    fn plan_restores_only_with_write_grant() {
        let read_only = vec![Grant::new(Grantee::group(ALL_USERS_GROUP), Permission::Read)];
        assert!(matches!(
            WritePlan::for_grants("b", "k", &read_only),
            WritePlan::WriteOnly
        ));

        let mut with_write = read_only.clone();
        with_write.push(Grant::new(Grantee::canonical_user("42"), Permission::Write));
        match WritePlan::for_grants("b", "k", &with_write) {
            WritePlan::WriteThenRestorePermissions(request) => {
                assert_eq!(request.grant_write.as_deref(), Some("id=\"42\""));
                assert!(request.grant_read.is_some());
            }
            WritePlan::WriteOnly => panic!("expected a permission restore"),
        }
    }

    #[test]
    fn disposal_never_targets_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("local.tmp");
        let other = dir.path().join("other.tmp");
        std::fs::write(&local, b"a").unwrap();
        std::fs::write(&other, b"b").unwrap();

        let same = Replacement {
            path: local.clone(),
            dispose: true,
            metadata: Metadata::new(),
        };
        drop(Disposal::new(&same, &local));
        assert!(local.exists());

        let kept = Replacement {
            path: other.clone(),
            dispose: false,
            metadata: Metadata::new(),
        };
        drop(Disposal::new(&kept, &local));
        assert!(other.exists());

        let disposable = Replacement {
            dispose: true,
            ..kept
        };
        drop(Disposal::new(&disposable, &local));
        assert!(!other.exists());
    }
}
