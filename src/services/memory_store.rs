//! MemoryObjectStore: an in-process [`ObjectStoreClient`].
//!
//! It mimics the store behaviour an overwrite has to cope with: a put replaces
//! the whole object, so anything not re-supplied (headers, metadata, tags,
//! grants) is lost. Every call is logged, and failures can be injected per
//! operation, which makes it the natural test double for
//! [`OverwriteService`](crate::services::overwrite_service::OverwriteService).

use crate::{
    encoding::{grants::parse_grant_string, tagging::parse_tagging_string},
    errors::{StoreError, StoreResult},
    models::{
        acl::{ALL_USERS_GROUP, AUTHENTICATED_USERS_GROUP, CannedAcl, Grant, Grantee, Permission},
        object::{Metadata, ObjectHeaders},
        request::{GetObjectOutput, PutObjectAclRequest, PutObjectOutput, PutObjectRequest},
        tagging::Tag,
    },
    services::store_client::ObjectStoreClient,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::debug;
use uuid::Uuid;

const OWNER_DISPLAY_NAME: &str = "owner";

/// The five store operations, used to address injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    GetObject,
    GetObjectTagging,
    GetObjectAcl,
    PutObject,
    PutObjectAcl,
}

/// A put-object request as received, with its body collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPut {
    pub bucket: String,
    pub key: String,
    pub content: Bytes,
    pub headers: ObjectHeaders,
    pub metadata: Metadata,
    pub tagging: Option<String>,
    pub acl: Option<CannedAcl>,
    pub grant_read: Option<String>,
    pub grant_read_acp: Option<String>,
    pub grant_write_acp: Option<String>,
    pub grant_full_control: Option<String>,
}

/// One entry of the call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    GetObject { bucket: String, key: String },
    GetObjectTagging { bucket: String, key: String },
    GetObjectAcl { bucket: String, key: String },
    PutObject(RecordedPut),
    PutObjectAcl(PutObjectAclRequest),
}

impl StoreCall {
    pub fn operation(&self) -> StoreOperation {
        match self {
            StoreCall::GetObject { .. } => StoreOperation::GetObject,
            StoreCall::GetObjectTagging { .. } => StoreOperation::GetObjectTagging,
            StoreCall::GetObjectAcl { .. } => StoreOperation::GetObjectAcl,
            StoreCall::PutObject(_) => StoreOperation::PutObject,
            StoreCall::PutObjectAcl(_) => StoreOperation::PutObjectAcl,
        }
    }
}

/// An object held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content: Bytes,
    pub headers: ObjectHeaders,
    pub metadata: Metadata,
    pub tags: Vec<Tag>,
    pub grants: Vec<Grant>,
    /// Hex MD5 of `content`.
    pub e_tag: String,
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    /// An object with `content`, no attributes and no grants.
    ///
    /// [`MemoryObjectStore::insert_object`] gives grant-less objects the
    /// owner's FULL_CONTROL grant.
    pub fn new(content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            e_tag: format!("{:x}", md5::compute(&content)),
            content,
            headers: ObjectHeaders::default(),
            metadata: Metadata::new(),
            tags: Vec::new(),
            grants: Vec::new(),
            version_id: Uuid::new_v4().to_string(),
            last_modified: Utc::now(),
        }
    }

    pub fn with_headers(mut self, headers: ObjectHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.headers.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    pub fn with_grant(mut self, grantee: Grantee, permission: Permission) -> Self {
        self.grants.push(Grant::new(grantee, permission));
        self
    }
}

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), StoredObject>,
    calls: Vec<StoreCall>,
    failures: HashMap<StoreOperation, StoreError>,
}

impl State {
    /// Log `call` and hand back a failure injected for its operation, if any.
    fn begin(&mut self, call: StoreCall) -> StoreResult<()> {
        let operation = call.operation();
        self.calls.push(call);
        match self.failures.remove(&operation) {
            Some(err) => {
                debug!("injected failure for {:?}: {}", operation, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn object(&self, bucket: &str, key: &str) -> StoreResult<&StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| not_found(bucket, key))
    }
}

/// Thread-safe in-memory object store owned by a single account.
pub struct MemoryObjectStore {
    owner_id: String,
    state: Mutex<State>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_owner(Uuid::new_v4().simple().to_string())
    }

    pub fn with_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Canonical id of the account owning every object.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `object` under `bucket/key`, replacing any previous object.
    pub fn insert_object(&self, bucket: &str, key: &str, mut object: StoredObject) {
        object.e_tag = format!("{:x}", md5::compute(&object.content));
        if object.grants.is_empty() {
            object.grants = vec![self.owner_grant()];
        }
        self.lock()
            .objects
            .insert((bucket.to_string(), key.to_string()), object);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock().object(bucket, key).ok().cloned()
    }

    pub fn set_grants(&self, bucket: &str, key: &str, grants: Vec<Grant>) -> StoreResult<()> {
        let mut state = self.lock();
        let object = state
            .objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| not_found(bucket, key))?;
        object.grants = grants;
        Ok(())
    }

    pub fn set_tags(&self, bucket: &str, key: &str, tags: Vec<Tag>) -> StoreResult<()> {
        let mut state = self.lock();
        let object = state
            .objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| not_found(bucket, key))?;
        object.tags = tags;
        Ok(())
    }

    /// Make the next call of `operation` fail with `err`.
    pub fn fail_on(&self, operation: StoreOperation, err: StoreError) {
        self.lock().failures.insert(operation, err);
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, operation: StoreOperation) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn owner_grant(&self) -> Grant {
        Grant::new(
            Grantee::CanonicalUser {
                id: self.owner_id.clone(),
                display_name: Some(OWNER_DISPLAY_NAME.into()),
            },
            Permission::FullControl,
        )
    }

    /// Parse the grant headers present, in header order.
    ///
    /// Headers carry bare ids; the owner's display name is filled back in.
    fn parse_grant_headers(
        &self,
        headers: &[(Permission, Option<&String>)],
    ) -> StoreResult<Vec<Grant>> {
        let mut grants = Vec::new();
        for (permission, header) in headers {
            if let Some(header) = header {
                let parsed = parse_grant_string(*permission, header)
                    .map_err(|err| StoreError::InvalidRequest(err.to_string()))?;
                grants.extend(parsed);
            }
        }

        for grant in &mut grants {
            if let Grantee::CanonicalUser { id, display_name } = &mut grant.grantee {
                if *id == self.owner_id && display_name.is_none() {
                    *display_name = Some(OWNER_DISPLAY_NAME.into());
                }
            }
        }
        Ok(grants)
    }

    /// Expand a canned ACL into the grants it stands for.
    fn canned_grants(&self, acl: CannedAcl) -> Vec<Grant> {
        let mut grants = vec![self.owner_grant()];
        match acl {
            CannedAcl::PublicRead => {
                grants.push(Grant::new(Grantee::group(ALL_USERS_GROUP), Permission::Read));
            }
            CannedAcl::PublicReadWrite => {
                grants.push(Grant::new(Grantee::group(ALL_USERS_GROUP), Permission::Read));
                grants.push(Grant::new(Grantee::group(ALL_USERS_GROUP), Permission::Write));
            }
            CannedAcl::AuthenticatedRead => {
                grants.push(Grant::new(
                    Grantee::group(AUTHENTICATED_USERS_GROUP),
                    Permission::Read,
                ));
            }
            // Single-account store: the bucket owner is the object owner.
            CannedAcl::Private
            | CannedAcl::AwsExecRead
            | CannedAcl::BucketOwnerRead
            | CannedAcl::BucketOwnerFullControl => {}
        }
        grants
    }
}

fn not_found(bucket: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObjectOutput> {
        let mut state = self.lock();
        state.begin(StoreCall::GetObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        let object = state.object(bucket, key)?;

        let content = object.content.clone();
        let body = stream::once(async move { Ok(content) }).boxed();
        Ok(GetObjectOutput {
            body,
            headers: object.headers.clone(),
            content_length: Some(object.content.len() as i64),
            e_tag: Some(format!("\"{}\"", object.e_tag)),
            last_modified: Some(object.last_modified),
            metadata: object.metadata.clone(),
            tag_count: (!object.tags.is_empty()).then(|| object.tags.len() as i32),
            version_id: Some(object.version_id.clone()),
        })
    }

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> StoreResult<Vec<Tag>> {
        let mut state = self.lock();
        state.begin(StoreCall::GetObjectTagging {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(state.object(bucket, key)?.tags.clone())
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> StoreResult<Vec<Grant>> {
        let mut state = self.lock();
        state.begin(StoreCall::GetObjectAcl {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(state.object(bucket, key)?.grants.clone())
    }

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutObjectOutput> {
        let has_explicit_grants = request.has_explicit_grants();
        let PutObjectRequest {
            bucket,
            key,
            mut body,
            content_length,
            headers,
            metadata,
            tagging,
            acl,
            grant_read,
            grant_read_acp,
            grant_write_acp,
            grant_full_control,
        } = request;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        let content = buffer.freeze();

        let recorded = RecordedPut {
            bucket,
            key,
            content,
            headers,
            metadata,
            tagging,
            acl,
            grant_read,
            grant_read_acp,
            grant_write_acp,
            grant_full_control,
        };

        let mut state = self.lock();
        state.begin(StoreCall::PutObject(recorded.clone()))?;

        if let Some(expected) = content_length {
            if expected != recorded.content.len() as i64 {
                return Err(StoreError::InvalidRequest(format!(
                    "content length {} does not match body of {} bytes",
                    expected,
                    recorded.content.len()
                )));
            }
        }

        let explicit = self.parse_grant_headers(&[
            (Permission::Read, recorded.grant_read.as_ref()),
            (Permission::ReadAcp, recorded.grant_read_acp.as_ref()),
            (Permission::WriteAcp, recorded.grant_write_acp.as_ref()),
            (Permission::FullControl, recorded.grant_full_control.as_ref()),
        ])?;
        let grants = match (recorded.acl, has_explicit_grants) {
            (Some(_), true) => {
                return Err(StoreError::InvalidRequest(
                    "canned ACL and explicit grants are mutually exclusive".into(),
                ));
            }
            (Some(acl), false) => self.canned_grants(acl),
            (None, true) => explicit,
            (None, false) => self.canned_grants(CannedAcl::Private),
        };

        let tags = match recorded.tagging.as_deref() {
            Some(tagging) => parse_tagging_string(tagging)
                .map_err(|err| StoreError::InvalidRequest(err.to_string()))?,
            None => Vec::new(),
        };

        let object = StoredObject {
            e_tag: format!("{:x}", md5::compute(&recorded.content)),
            content: recorded.content,
            headers: recorded.headers,
            metadata: recorded.metadata,
            tags,
            grants,
            version_id: Uuid::new_v4().to_string(),
            last_modified: Utc::now(),
        };
        let output = PutObjectOutput {
            e_tag: Some(format!("\"{}\"", object.e_tag)),
            version_id: Some(object.version_id.clone()),
        };

        debug!(
            "stored {}/{} ({} bytes)",
            recorded.bucket,
            recorded.key,
            object.content.len()
        );
        state
            .objects
            .insert((recorded.bucket, recorded.key), object);
        Ok(output)
    }

    async fn put_object_acl(&self, request: PutObjectAclRequest) -> StoreResult<()> {
        let mut state = self.lock();
        state.begin(StoreCall::PutObjectAcl(request.clone()))?;

        let grants = self.parse_grant_headers(&[
            (Permission::Read, request.grant_read.as_ref()),
            (Permission::Write, request.grant_write.as_ref()),
            (Permission::ReadAcp, request.grant_read_acp.as_ref()),
            (Permission::WriteAcp, request.grant_write_acp.as_ref()),
            (Permission::FullControl, request.grant_full_control.as_ref()),
        ])?;
        if grants.is_empty() {
            return Err(StoreError::InvalidRequest(
                "permission update carries no grants".into(),
            ));
        }

        let object = state
            .objects
            .get_mut(&(request.bucket.clone(), request.key.clone()))
            .ok_or_else(|| not_found(&request.bucket, &request.key))?;
        object.grants = grants;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::grants::grant_string;

    async fn read_body(output: GetObjectOutput) -> Bytes {
        let mut body = output.body;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk.unwrap());
        }
        buffer.freeze()
    }

    #[tokio::test]
    async fn get_reports_attributes_and_tag_count() {
        let store = MemoryObjectStore::with_owner("owner-1");
        store.insert_object(
            "b",
            "k",
            StoredObject::new("hello")
                .with_content_type("text/plain")
                .with_metadata("author", "me")
                .with_tag("env", "test"),
        );

        let output = store.get_object("b", "k").await.unwrap();
        assert_eq!(output.headers.content_type.as_deref(), Some("text/plain"));
        assert_eq!(output.content_length, Some(5));
        assert_eq!(output.tag_count, Some(1));
        assert_eq!(output.metadata.get("author").map(String::as_str), Some("me"));
        assert_eq!(
            output.e_tag,
            Some(format!("\"{:x}\"", md5::compute("hello")))
        );
        assert_eq!(read_body(output).await, Bytes::from("hello"));

        let grants = store.get_object_acl("b", "k").await.unwrap();
        assert_eq!(grant_string(&grants, Permission::FullControl), "id=\"owner-1\"");
    }

    #[tokio::test]
    async fn put_drops_attributes_not_supplied() {
        let store = MemoryObjectStore::new();
        store.insert_object(
            "b",
            "k",
            StoredObject::new("old")
                .with_content_type("text/plain")
                .with_tag("env", "test")
                .with_grant(Grantee::group(ALL_USERS_GROUP), Permission::Read),
        );

        let request = PutObjectRequest::new(
            "b",
            "k",
            stream::once(async { Ok(Bytes::from("new")) }).boxed(),
        );
        store.put_object(request).await.unwrap();

        let object = store.object("b", "k").unwrap();
        assert_eq!(object.content, Bytes::from("new"));
        assert_eq!(object.headers, ObjectHeaders::default());
        assert!(object.tags.is_empty());
        assert_eq!(object.grants, vec![store.owner_grant()]);
    }

    #[tokio::test]
    async fn put_rejects_canned_acl_with_grants() {
        let store = MemoryObjectStore::new();
        let mut request = PutObjectRequest::new(
            "b",
            "k",
            stream::once(async { Ok(Bytes::from("x")) }).boxed(),
        );
        request.acl = Some(CannedAcl::PublicRead);
        request.grant_read = Some("id=\"1\"".into());
        assert!(request.has_explicit_grants());

        let err = store.put_object(request).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
        assert!(store.object("b", "k").is_none());
    }

    #[tokio::test]
    async fn injected_failure_fires_once_and_is_logged() {
        let store = MemoryObjectStore::new();
        store.insert_object("b", "k", StoredObject::new("x"));
        store.fail_on(
            StoreOperation::GetObjectAcl,
            StoreError::AccessDenied("nope".into()),
        );

        assert!(store.get_object_acl("b", "k").await.is_err());
        assert!(store.get_object_acl("b", "k").await.is_ok());
        assert_eq!(store.calls_to(StoreOperation::GetObjectAcl).len(), 2);
    }

    #[tokio::test]
    async fn acl_update_replaces_grants() {
        let store = MemoryObjectStore::new();
        store.insert_object("b", "k", StoredObject::new("x"));

        store
            .put_object_acl(PutObjectAclRequest {
                bucket: "b".into(),
                key: "k".into(),
                grant_read: None,
                grant_read_acp: None,
                grant_write_acp: None,
                grant_write: Some(format!("uri=\"{}\"", AUTHENTICATED_USERS_GROUP)),
                grant_full_control: None,
            })
            .await
            .unwrap();

        let object = store.object("b", "k").unwrap();
        assert_eq!(
            object.grants,
            vec![Grant::new(
                Grantee::group(AUTHENTICATED_USERS_GROUP),
                Permission::Write
            )]
        );
    }

    #[tokio::test]
    async fn owner_grant_survives_header_round_trip() {
        let store = MemoryObjectStore::with_owner("owner-1");
        store.insert_object("b", "k", StoredObject::new("x"));
        let before = store.object("b", "k").unwrap().grants;

        let mut request = PutObjectRequest::new(
            "b",
            "k",
            stream::once(async { Ok(Bytes::from("y")) }).boxed(),
        );
        request.grant_full_control = Some(grant_string(&before, Permission::FullControl));
        assert!(request.has_explicit_grants());
        store.put_object(request).await.unwrap();

        assert_eq!(store.object("b", "k").unwrap().grants, before);
    }

    #[tokio::test]
    async fn clear_calls_empties_the_log_only() {
        let store = MemoryObjectStore::new();
        store.insert_object("b", "k", StoredObject::new("x"));
        store.get_object_tagging("b", "k").await.unwrap();
        assert_eq!(store.calls().len(), 1);

        store.clear_calls();
        assert!(store.calls().is_empty());
        assert!(store.object("b", "k").is_some());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryObjectStore::new();
        let err = store.get_object("b", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
