//! Capability interface over an object-storage service
//!
//! Exposes exactly the request shapes the [`StorageHandler`](super::StorageHandler)
//! needs. [`S3Client`](super::S3Client) is the network variant and
//! [`MemoryStorage`](super::MemoryStorage) the scriptable in-memory one.

use crate::client::LocationConstraint;
use crate::error::Result;
use crate::storage::types::{CannedAcl, CorsRule, EncryptionConfig, ObjectMetadata, VersioningStatus};
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Names of all buckets owned by the account, in provider order
    async fn list_buckets(&self) -> Result<Vec<String>>;

    async fn create_bucket(&self, bucket: &str, location: &LocationConstraint) -> Result<()>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata>;

    /// Keys in `bucket`, optionally restricted to `prefix`, in key order
    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Server-side copy
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()>;

    /// Start restoring an archived object for `days`; does not wait
    async fn restore_object(&self, bucket: &str, key: &str, days: u32) -> Result<()>;

    async fn put_object_acl(&self, bucket: &str, key: &str, acl: CannedAcl) -> Result<()>;

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus>;

    async fn put_bucket_versioning(&self, bucket: &str, status: VersioningStatus) -> Result<()>;

    async fn get_bucket_cors(&self, bucket: &str) -> Result<Vec<CorsRule>>;

    /// Replace the whole CORS configuration
    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()>;

    async fn get_bucket_encryption(&self, bucket: &str) -> Result<EncryptionConfig>;

    /// Time-limited GET URL for one object. No request is sent.
    async fn presign_get(&self, bucket: &str, key: &str, expires_secs: u64) -> Result<String>;
}
