//! Object snapshot: the object's bytes in a private local file plus the
//! attributes the store reported with them.
//!
//! The local file belongs to [`LocalCopy`] and is deleted when that handle is
//! dropped, so every exit path of an overwrite (including a panicking
//! transform) releases it.

use crate::{
    config::OverwriteConfig,
    errors::{FetchTarget, OverwriteError, StoreError, StoreResult},
    models::{
        object::{ByteStream, ObjectSnapshot},
        request::GetObjectOutput,
    },
    services::store_client::{ObjectStoreClient, until_cancelled},
};
use futures::StreamExt;
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::Path,
};
use tempfile::TempPath;
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Transient on-disk copy of an object's content.
#[derive(Debug)]
pub struct LocalCopy {
    path: TempPath,
    size_bytes: i64,
    md5_hex: String,
}

impl LocalCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes received from the store.
    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }

    /// Hex MD5 of the received bytes.
    pub fn md5_hex(&self) -> &str {
        &self.md5_hex
    }
}

/// Fetch `bucket/key` into a fresh local copy and describe it.
///
/// Nothing is left on disk when this fails.
pub async fn fetch_snapshot<C>(
    client: &C,
    config: &OverwriteConfig,
    cancel: &CancellationToken,
    bucket: &str,
    key: &str,
) -> Result<(ObjectSnapshot, LocalCopy), OverwriteError>
where
    C: ObjectStoreClient + ?Sized,
{
    let output = until_cancelled(cancel, client.get_object(bucket, key))
        .await
        .map_err(|source| OverwriteError::fetch(bucket, key, FetchTarget::Object, source))?;

    let GetObjectOutput {
        body,
        headers,
        content_length,
        e_tag,
        last_modified,
        metadata,
        tag_count,
        version_id,
    } = output;

    let local = until_cancelled(cancel, download(body, config))
        .await
        .map_err(|source| OverwriteError::fetch(bucket, key, FetchTarget::LocalCopy, source))?;

    if config.verify_download {
        verify(&local, content_length)
            .map_err(|source| OverwriteError::fetch(bucket, key, FetchTarget::LocalCopy, source))?;
    }

    debug!(
        "downloaded {} bytes of {}/{} to {} (md5 {})",
        local.size_bytes,
        bucket,
        key,
        local.path().display(),
        local.md5_hex
    );

    let snapshot = ObjectSnapshot {
        bucket: bucket.to_string(),
        key: key.to_string(),
        headers,
        content_length,
        e_tag,
        last_modified,
        metadata,
        tag_count,
        version_id,
    };

    Ok((snapshot, local))
}

/// Stream `body` into a new private temp file, hashing as it goes.
async fn download(mut body: ByteStream, config: &OverwriteConfig) -> StoreResult<LocalCopy> {
    let temp = tempfile::Builder::new()
        .prefix(&config.temp_prefix)
        .suffix(".tmp")
        .tempfile_in(&config.temp_dir)?;
    let (file, path) = temp.into_parts();
    let mut file = File::from_std(file);

    let mut size_bytes: i64 = 0;
    let mut digest = Context::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as i64;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok(LocalCopy {
        path,
        size_bytes,
        md5_hex: format!("{:x}", digest.compute()),
    })
}

/// Compare the received byte count with the length the store announced.
///
/// The ETag is not compared: it is only an MD5 of the content for
/// unencrypted single-part uploads, and nothing in the response says which
/// kind it is.
fn verify(local: &LocalCopy, content_length: Option<i64>) -> StoreResult<()> {
    match content_length {
        Some(expected) if expected != local.size_bytes => Err(StoreError::Io(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!(
                "received {} bytes, store reported {}",
                local.size_bytes, expected
            ),
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    fn body(chunks: Vec<io::Result<Bytes>>) -> ByteStream {
        Box::pin(stream::iter(chunks))
    }

    fn config(dir: &Path) -> OverwriteConfig {
        OverwriteConfig::default().with_temp_dir(dir)
    }

    #[tokio::test]
    async fn download_hashes_and_keeps_file_until_drop() {
        let dir = tempfile::tempdir().unwrap();
        let local = download(
            body(vec![Ok(Bytes::from("test ")), Ok(Bytes::from("content"))]),
            &config(dir.path()),
        )
        .await
        .unwrap();

        assert_eq!(local.size_bytes(), 12);
        assert_eq!(local.md5_hex(), format!("{:x}", md5::compute("test content")));
        assert_eq!(std::fs::read(local.path()).unwrap(), b"test content");

        let name = local.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("s3-overwrite-"));
        assert!(name.ends_with(".tmp"));

        let path = local.path().to_path_buf();
        drop(local);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_copy_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let local = download(body(vec![Ok(Bytes::from("x"))]), &config(dir.path()))
            .await
            .unwrap();
        let mode = std::fs::metadata(local.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[tokio::test]
    async fn failed_stream_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let result = download(
            body(vec![
                Ok(Bytes::from("partial")),
                Err(io::Error::new(ErrorKind::ConnectionReset, "reset")),
            ]),
            &config(dir.path()),
        )
        .await;

        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn verify_checks_length_only() {
        let dir = tempfile::tempdir().unwrap();
        let local = download(body(vec![Ok(Bytes::from("abc"))]), &config(dir.path()))
            .await
            .unwrap();

        assert!(verify(&local, Some(3)).is_ok());
        assert!(verify(&local, None).is_ok());
        assert!(matches!(
            verify(&local, Some(4)),
            Err(StoreError::Io(err)) if err.kind() == ErrorKind::UnexpectedEof
        ));
    }
}
