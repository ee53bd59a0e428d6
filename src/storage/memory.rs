//! Scriptable in-memory storage backend
//!
//! Behaves like the object store for the request shapes in [`StorageApi`],
//! including its error codes, and records every call so tests can assert on
//! how many requests a handler operation issued. Failures can be injected per
//! operation, once or persistently.

use crate::client::LocationConstraint;
use crate::error::{RequestError, Result};
use crate::storage::api::StorageApi;
use crate::storage::types::{
    is_archival, CannedAcl, CorsRule, EncryptionConfig, ObjectMetadata, VersioningStatus,
};
use async_trait::async_trait;
use bytes::Bytes;
use hyper::StatusCode;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Request shapes of [`StorageApi`], used to count calls and script failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    HeadObject,
    ListObjects,
    GetObject,
    PutObject,
    DeleteObject,
    CopyObject,
    RestoreObject,
    PutObjectAcl,
    GetBucketVersioning,
    PutBucketVersioning,
    GetBucketCors,
    PutBucketCors,
    GetBucketEncryption,
    PresignGet,
}

type FaultFn = Box<dyn Fn() -> RequestError + Send + Sync>;

#[derive(Default)]
struct Faults {
    once: VecDeque<RequestError>,
    always: Option<FaultFn>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    storage_class: Option<String>,
    acl: CannedAcl,
    restore: Option<String>,
}

impl StoredObject {
    fn standard(data: Bytes) -> Self {
        Self {
            data,
            storage_class: None,
            acl: CannedAcl::Private,
            restore: None,
        }
    }

    /// Archived objects can be read only once a restore has completed
    fn readable(&self) -> bool {
        !is_archival(self.storage_class.as_deref()) || self.restore.is_some()
    }
}

#[derive(Debug, Clone)]
struct BucketState {
    location: Option<String>,
    objects: BTreeMap<String, StoredObject>,
    versioning: VersioningStatus,
    cors: Vec<CorsRule>,
    encryption: Option<EncryptionConfig>,
}

impl BucketState {
    fn new(location: Option<String>) -> Self {
        Self {
            location,
            objects: BTreeMap::new(),
            versioning: VersioningStatus::Unset,
            cors: Vec::new(),
            encryption: None,
        }
    }
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BucketState>,
    calls: HashMap<Op, usize>,
    faults: HashMap<Op, Faults>,
    presign_base: Option<String>,
}

/// In-memory [`StorageApi`] variant
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

fn no_such_bucket(bucket: &str) -> RequestError {
    RequestError::service(
        StatusCode::NOT_FOUND,
        "NoSuchBucket",
        format!("The specified bucket does not exist: {}", bucket),
    )
}

fn no_such_key(key: &str) -> RequestError {
    RequestError::service(
        StatusCode::NOT_FOUND,
        "NoSuchKey",
        format!("The specified key does not exist: {}", key),
    )
}

fn invalid_object_state(message: &str) -> RequestError {
    RequestError::service(StatusCode::FORBIDDEN, "InvalidObjectState", message)
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed an empty bucket with no location
    pub fn with_bucket(self, bucket: &str) -> Self {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(|| BucketState::new(None));
        self
    }

    /// Seed an object, creating its bucket if needed
    pub fn with_object(self, bucket: &str, key: &str, data: impl Into<Bytes>) -> Self {
        self.insert_object(bucket, key, data.into(), None);
        self
    }

    /// Seed an object stored in an archival class such as `GLACIER`
    pub fn with_archived_object(
        self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        storage_class: &str,
    ) -> Self {
        self.insert_object(bucket, key, data.into(), Some(storage_class.to_string()));
        self
    }

    /// Seed a default encryption configuration on a bucket
    pub fn with_encryption(self, bucket: &str, config: EncryptionConfig) -> Self {
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(|| BucketState::new(None))
            .encryption = Some(config);
        self
    }

    /// Return `{base}/{bucket}/{key}?expires={n}` from `presign_get` instead of
    /// the default `memory://` URL
    pub fn with_presign_base(self, base: &str) -> Self {
        self.lock().presign_base = Some(base.trim_end_matches('/').to_string());
        self
    }

    fn insert_object(&self, bucket: &str, key: &str, data: Bytes, storage_class: Option<String>) {
        let mut object = StoredObject::standard(data);
        object.storage_class = storage_class;
        self.lock()
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(|| BucketState::new(None))
            .objects
            .insert(key.to_string(), object);
    }

    /// Fail the next call of `op` with `err`. Queued failures are used in order.
    pub fn fail_next(&self, op: Op, err: RequestError) {
        self.lock().faults.entry(op).or_default().once.push_back(err);
    }

    /// Fail every call of `op` until [`MemoryStorage::clear_failures`]
    pub fn fail_always<F>(&self, op: Op, make_err: F)
    where
        F: Fn() -> RequestError + Send + Sync + 'static,
    {
        self.lock().faults.entry(op).or_default().always = Some(Box::new(make_err));
    }

    pub fn clear_failures(&self) {
        self.lock().faults.clear();
    }

    /// Number of times `op` was requested, including failed attempts
    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn bucket_names(&self) -> Vec<String> {
        self.lock().buckets.keys().cloned().collect()
    }

    /// Location the bucket was created with; `None` for the default region
    pub fn bucket_location(&self, bucket: &str) -> Option<String> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.location.clone())
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.clone())
    }

    pub fn object_acl(&self, bucket: &str, key: &str) -> Option<CannedAcl> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.acl)
    }

    pub fn cors(&self, bucket: &str) -> Option<Vec<CorsRule>> {
        self.lock().buckets.get(bucket).map(|b| b.cors.clone())
    }

    /// Count the call and pop any scripted failure, then hand out the state
    fn begin(&self, op: Op) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;

        if let Some(faults) = state.faults.get_mut(&op) {
            if let Some(err) = faults.once.pop_front() {
                return Err(err);
            }
            if let Some(make_err) = &faults.always {
                return Err(make_err());
            }
        }
        Ok(state)
    }
}

fn bucket_mut<'a>(state: &'a mut State, bucket: &str) -> Result<&'a mut BucketState> {
    state
        .buckets
        .get_mut(bucket)
        .ok_or_else(|| no_such_bucket(bucket))
}

fn object_mut<'a>(state: &'a mut State, bucket: &str, key: &str) -> Result<&'a mut StoredObject> {
    bucket_mut(state, bucket)?
        .objects
        .get_mut(key)
        .ok_or_else(|| no_such_key(key))
}

#[async_trait]
impl StorageApi for MemoryStorage {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let state = self.begin(Op::ListBuckets)?;
        Ok(state.buckets.keys().cloned().collect())
    }

    async fn create_bucket(&self, bucket: &str, location: &LocationConstraint) -> Result<()> {
        let mut state = self.begin(Op::CreateBucket)?;
        if state.buckets.contains_key(bucket) {
            return Err(RequestError::service(
                StatusCode::CONFLICT,
                "BucketAlreadyOwnedByYou",
                "Your previous request to create the named bucket succeeded and you already own it.",
            ));
        }
        let stored_location = location
            .requires_body()
            .then(|| location.region().to_string());
        state
            .buckets
            .insert(bucket.to_string(), BucketState::new(stored_location));
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.begin(Op::DeleteBucket)?;
        if !bucket_mut(&mut state, bucket)?.objects.is_empty() {
            return Err(RequestError::service(
                StatusCode::CONFLICT,
                "BucketNotEmpty",
                "The bucket you tried to delete is not empty",
            ));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let mut state = self.begin(Op::HeadObject)?;
        // HEAD responses have no body, so the provider only reports the status
        let object = object_mut(&mut state, bucket, key)
            .map_err(|_| RequestError::service(StatusCode::NOT_FOUND, "404", "Not Found"))?;

        Ok(ObjectMetadata {
            content_length: object.data.len() as u64,
            content_type: Some("application/octet-stream".to_string()),
            etag: Some(format!("\"{:x}\"", md5::compute(&object.data))),
            storage_class: object.storage_class.clone(),
            restore: object.restore.clone(),
            ..ObjectMetadata::default()
        })
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>> {
        let mut state = self.begin(Op::ListObjects)?;
        let prefix = prefix.unwrap_or("");
        Ok(bucket_mut(&mut state, bucket)?
            .objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let mut state = self.begin(Op::GetObject)?;
        let object = object_mut(&mut state, bucket, key)?;
        if !object.readable() {
            return Err(invalid_object_state(
                "The operation is not valid for the object's storage class",
            ));
        }
        Ok(object.data.clone())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let mut state = self.begin(Op::PutObject)?;
        bucket_mut(&mut state, bucket)?
            .objects
            .insert(key.to_string(), StoredObject::standard(data));
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.begin(Op::DeleteObject)?;
        // Deleting an absent key succeeds
        bucket_mut(&mut state, bucket)?.objects.remove(key);
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let mut state = self.begin(Op::CopyObject)?;
        let source = object_mut(&mut state, src_bucket, src_key)?;
        if !source.readable() {
            return Err(invalid_object_state(
                "The source object of the COPY action is not in the active tier",
            ));
        }
        let data = source.data.clone();
        bucket_mut(&mut state, dst_bucket)?
            .objects
            .insert(dst_key.to_string(), StoredObject::standard(data));
        Ok(())
    }

    async fn restore_object(&self, bucket: &str, key: &str, days: u32) -> Result<()> {
        let mut state = self.begin(Op::RestoreObject)?;
        let object = object_mut(&mut state, bucket, key)?;
        if !is_archival(object.storage_class.as_deref()) {
            return Err(invalid_object_state(
                "Restore is not allowed for the object's current storage class",
            ));
        }
        // Restores complete instantly here
        object.restore = Some(format!("ongoing-request=\"false\", days=\"{}\"", days));
        Ok(())
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, acl: CannedAcl) -> Result<()> {
        let mut state = self.begin(Op::PutObjectAcl)?;
        object_mut(&mut state, bucket, key)?.acl = acl;
        Ok(())
    }

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus> {
        let mut state = self.begin(Op::GetBucketVersioning)?;
        Ok(bucket_mut(&mut state, bucket)?.versioning)
    }

    async fn put_bucket_versioning(&self, bucket: &str, status: VersioningStatus) -> Result<()> {
        let mut state = self.begin(Op::PutBucketVersioning)?;
        if status == VersioningStatus::Unset {
            return Err(RequestError::service(
                StatusCode::BAD_REQUEST,
                "MalformedXML",
                "Status must be Enabled or Suspended",
            ));
        }
        bucket_mut(&mut state, bucket)?.versioning = status;
        Ok(())
    }

    async fn get_bucket_cors(&self, bucket: &str) -> Result<Vec<CorsRule>> {
        let mut state = self.begin(Op::GetBucketCors)?;
        let cors = &bucket_mut(&mut state, bucket)?.cors;
        if cors.is_empty() {
            return Err(RequestError::service(
                StatusCode::NOT_FOUND,
                "NoSuchCORSConfiguration",
                "The CORS configuration does not exist",
            ));
        }
        Ok(cors.clone())
    }

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()> {
        let mut state = self.begin(Op::PutBucketCors)?;
        bucket_mut(&mut state, bucket)?.cors = rules.to_vec();
        Ok(())
    }

    async fn get_bucket_encryption(&self, bucket: &str) -> Result<EncryptionConfig> {
        let mut state = self.begin(Op::GetBucketEncryption)?;
        bucket_mut(&mut state, bucket)?
            .encryption
            .clone()
            .ok_or_else(|| {
                RequestError::service(
                    StatusCode::NOT_FOUND,
                    "ServerSideEncryptionConfigurationNotFoundError",
                    "The server side encryption configuration was not found",
                )
            })
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_secs: u64) -> Result<String> {
        let state = self.begin(Op::PresignGet)?;
        let base = state.presign_base.as_deref().unwrap_or("memory://");
        let separator = if base.ends_with("//") { "" } else { "/" };
        Ok(format!(
            "{}{}{}/{}?expires={}",
            base, separator, bucket, key, expires_secs
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_lifecycle_error_codes() {
        let store = MemoryStorage::new();
        let location = LocationConstraint::new("eu-west-1");

        store.create_bucket("b", &location).await.unwrap();
        let err = store.create_bucket("b", &location).await.unwrap_err();
        assert_eq!(err.code(), Some("BucketAlreadyOwnedByYou"));
        assert_eq!(store.bucket_location("b").as_deref(), Some("eu-west-1"));

        store.put_object("b", "k", Bytes::from_static(b"x")).await.unwrap();
        let err = store.delete_bucket("b").await.unwrap_err();
        assert_eq!(err.code(), Some("BucketNotEmpty"));

        store.delete_object("b", "k").await.unwrap();
        store.delete_bucket("b").await.unwrap();
        let err = store.delete_bucket("b").await.unwrap_err();
        assert_eq!(err.code(), Some("NoSuchBucket"));

        assert_eq!(store.calls(Op::CreateBucket), 2);
        assert_eq!(store.calls(Op::DeleteBucket), 3);
    }

    #[tokio::test]
    async fn test_default_region_bucket_has_no_location() {
        let store = MemoryStorage::new();
        store
            .create_bucket("b", &LocationConstraint::new("us-east-1"))
            .await
            .unwrap();
        assert_eq!(store.bucket_location("b"), None);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let store = MemoryStorage::new().with_bucket("b");

        store.fail_next(
            Op::ListBuckets,
            RequestError::service(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", "boom"),
        );
        assert!(store.list_buckets().await.is_err());
        assert_eq!(store.list_buckets().await.unwrap(), vec!["b"]);

        store.fail_always(Op::GetObject, || RequestError::Transport("reset".into()));
        assert!(store.get_object("b", "k").await.is_err());
        assert!(store.get_object("b", "k").await.is_err());

        store.clear_failures();
        let err = store.get_object("b", "k").await.unwrap_err();
        assert_eq!(err.code(), Some("NoSuchKey"));
        assert_eq!(store.calls(Op::GetObject), 3);
    }

    #[tokio::test]
    async fn test_archived_object_needs_restore() {
        let store = MemoryStorage::new().with_archived_object("b", "cold", "data", "GLACIER");

        let err = store.get_object("b", "cold").await.unwrap_err();
        assert_eq!(err.code(), Some("InvalidObjectState"));

        store.restore_object("b", "cold", 1).await.unwrap();
        assert_eq!(store.get_object("b", "cold").await.unwrap(), "data");

        let store = MemoryStorage::new().with_object("b", "warm", "data");
        let err = store.restore_object("b", "warm", 1).await.unwrap_err();
        assert_eq!(err.code(), Some("InvalidObjectState"));
    }

    #[tokio::test]
    async fn test_missing_configuration_codes() {
        let store = MemoryStorage::new().with_bucket("b");

        let err = store.get_bucket_cors("b").await.unwrap_err();
        assert_eq!(err.code(), Some("NoSuchCORSConfiguration"));

        let err = store.get_bucket_encryption("b").await.unwrap_err();
        assert_eq!(err.code(), Some("ServerSideEncryptionConfigurationNotFoundError"));
    }

    #[tokio::test]
    async fn test_head_missing_object_reports_bare_status() {
        let store = MemoryStorage::new().with_bucket("b");
        let err = store.head_object("b", "nope").await.unwrap_err();
        assert_eq!(err.code(), Some("404"));
        assert!(err.is_not_found());
    }
}
