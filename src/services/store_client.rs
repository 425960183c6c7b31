//! The store operations an overwrite depends on.
//!
//! Any transport client (or test double) exposing these five calls can be
//! driven by [`OverwriteService`](crate::services::overwrite_service::OverwriteService).

use crate::{
    errors::{StoreError, StoreResult},
    models::{
        acl::Grant,
        request::{GetObjectOutput, PutObjectAclRequest, PutObjectOutput, PutObjectRequest},
        tagging::Tag,
    },
};
use async_trait::async_trait;
use std::{future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Read an object's content and attributes.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput>;

    /// Read an object's tag set.
    async fn get_object_tagging(&self, bucket: &str, key: &str) -> StoreResult<Vec<Tag>>;

    /// Read an object's ACL grants.
    async fn get_object_acl(&self, bucket: &str, key: &str) -> StoreResult<Vec<Grant>>;

    /// Create or fully replace an object.
    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutObjectOutput>;

    /// Replace an existing object's ACL.
    async fn put_object_acl(&self, request: PutObjectAclRequest) -> StoreResult<()>;
}

#[async_trait]
impl<T> ObjectStoreClient for Arc<T>
where
    T: ObjectStoreClient + ?Sized,
{
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        (**self).get_object(bucket, key).await
    }

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> StoreResult<Vec<Tag>> {
        (**self).get_object_tagging(bucket, key).await
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> StoreResult<Vec<Grant>> {
        (**self).get_object_acl(bucket, key).await
    }

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutObjectOutput> {
        (**self).put_object(request).await
    }

    async fn put_object_acl(&self, request: PutObjectAclRequest) -> StoreResult<()> {
        (**self).put_object_acl(request).await
    }
}

/// Run a store call unless `cancel` has fired; abandon it if it fires midway.
///
/// A call is never started once the token is cancelled.
pub(crate) async fn until_cancelled<T, F>(cancel: &CancellationToken, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::Cancelled),
        result = call => result,
    }
}
