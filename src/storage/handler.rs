//! Storage resource handler
//!
//! Every operation is one live request (or a documented pair of requests)
//! against the [`StorageApi`]. Provider failures never escape: each one is
//! classified, logged through the injected [`OperationLogger`] and turned
//! into the operation's "no result" value. Mutating operations return `true`
//! when the provider accepted the request.

use crate::client::{ClientBinding, ClientFactory, LocationConstraint, ResourceFamily};
use crate::config::{self, CredentialBundle, CredentialResolver};
use crate::error::{ConfigError, FailureClass, RequestError};
use crate::logger::{self, OperationLogger};
use crate::storage::api::StorageApi;
use crate::storage::client::S3Client;
use crate::storage::types::{
    CannedAcl, CorsRule, EncryptionConfig, ObjectMetadata, ReadOutcome, VersioningStatus,
};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

/// Lifetime of a temporary access URL when the caller does not choose one
pub const DEFAULT_URL_EXPIRATION: u64 = 600;

/// Longest lifetime the provider grants a temporary access URL (seven days)
pub const MAX_URL_EXPIRATION: u64 = 604_800;

/// Days an archived object stays readable after a default restore
pub const DEFAULT_RESTORE_DAYS: u32 = 1;

/// Bucket and object operations over one storage binding
pub struct StorageHandler<A: StorageApi = S3Client> {
    api: A,
    location: Option<LocationConstraint>,
    logger: Arc<dyn OperationLogger>,
}

impl StorageHandler<S3Client> {
    /// Handler over a storage binding, taking its location constraint
    pub fn from_binding(binding: ClientBinding) -> Result<Self, ConfigError> {
        let location = binding.location_constraint().cloned();
        let api = S3Client::from_binding(binding)?;
        Ok(Self::new(api, location))
    }

    pub fn connect(bundle: &CredentialBundle, factory: &ClientFactory) -> Result<Self, ConfigError> {
        Self::from_binding(factory.build(bundle, ResourceFamily::Storage)?)
    }

    /// Resolve credentials from the environment (or secrets file) and connect
    pub fn from_env() -> Result<Self, ConfigError> {
        let bundle = CredentialResolver::new().resolve()?;
        let factory = ClientFactory::from_config(&config::load_from_env());
        Self::connect(&bundle, &factory)
    }
}

impl<A: StorageApi> StorageHandler<A> {
    pub fn new(api: A, location: Option<LocationConstraint>) -> Self {
        Self {
            api,
            location,
            logger: logger::noop(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn OperationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn location(&self) -> Option<&LocationConstraint> {
        self.location.as_ref()
    }

    /// Log a classified failure of `action`
    fn report(&self, action: &str, err: &RequestError) {
        match err.class() {
            FailureClass::NotFound | FailureClass::Request => {
                self.logger
                    .error(&format!("A client error occurred while {}: {}", action, err));
            }
            FailureClass::Unexpected => {
                self.logger
                    .error(&format!("An unexpected error occurred while {}: {}", action, err));
            }
        }
    }

    /// Names of all buckets; `None` when the listing failed
    pub async fn list_containers(&self) -> Option<Vec<String>> {
        self.logger.debug("Listing buckets");
        match self.api.list_buckets().await {
            Ok(buckets) => {
                self.logger.info(&format!("Found {} bucket(s)", buckets.len()));
                Some(buckets)
            }
            Err(e) => {
                self.report("listing buckets", &e);
                None
            }
        }
    }

    /// Create `name` in the recorded region unless a bucket of that name is
    /// already listed.
    ///
    /// The check and the create are two separate requests; a concurrent
    /// creator can slip in between them.
    pub async fn create_container(&self, name: &str) -> bool {
        if name.is_empty() {
            self.logger.error("Cannot create a bucket with an empty name");
            return false;
        }
        let Some(location) = &self.location else {
            self.logger.error(&format!(
                "Cannot create bucket '{}': the client was built without a region",
                name
            ));
            return false;
        };

        let Some(existing) = self.list_containers().await else {
            self.logger.error(&format!(
                "Skipping creation of bucket '{}': existing buckets could not be listed",
                name
            ));
            return false;
        };
        if existing.iter().any(|b| b == name) {
            self.logger
                .info(&format!("The bucket {} already exists", name));
            return true;
        }

        self.logger
            .debug(&format!("Creating bucket '{}' in {}", name, location));
        match self.api.create_bucket(name, location).await {
            Ok(()) => {
                self.logger
                    .info(&format!("The bucket {} has been successfully created", name));
                true
            }
            Err(e) => {
                self.report(&format!("creating bucket '{}'", name), &e);
                false
            }
        }
    }

    /// Delete an empty bucket
    pub async fn delete_container(&self, name: &str) -> bool {
        self.logger.debug(&format!("Deleting bucket '{}'", name));
        match self.api.delete_bucket(name).await {
            Ok(()) => {
                self.logger
                    .info(&format!("The bucket {} has been deleted", name));
                true
            }
            Err(e) => {
                self.report(&format!("deleting bucket '{}'", name), &e);
                false
            }
        }
    }

    /// Whether `key` exists in `bucket`.
    ///
    /// A not-found answer is logged as a warning; any other failure is logged
    /// as an error. Both yield `false`.
    pub async fn object_exists(&self, bucket: &str, key: &str) -> bool {
        self.logger
            .debug(&format!("Checking for '{}' in bucket '{}'", key, bucket));
        match self.api.head_object(bucket, key).await {
            Ok(_) => {
                self.logger
                    .info(&format!("The file '{}' exists in bucket '{}'", key, bucket));
                true
            }
            Err(e) if e.is_not_found() => {
                self.logger.warning(&format!(
                    "The file '{}' does not exist in bucket '{}'",
                    key, bucket
                ));
                false
            }
            Err(e) => {
                self.report(&format!("checking for '{}' in bucket '{}'", key, bucket), &e);
                false
            }
        }
    }

    /// Every key in `bucket`; empty for an empty bucket, `None` on failure
    pub async fn list_objects(&self, bucket: &str) -> Option<Vec<String>> {
        self.list_keys(bucket, None).await
    }

    pub async fn list_objects_with_prefix(&self, bucket: &str, prefix: &str) -> Option<Vec<String>> {
        self.list_keys(bucket, Some(prefix)).await
    }

    async fn list_keys(&self, bucket: &str, prefix: Option<&str>) -> Option<Vec<String>> {
        self.logger
            .debug(&format!("Listing objects in bucket '{}'", bucket));
        match self.api.list_objects(bucket, prefix).await {
            Ok(keys) => {
                self.logger.info(&format!(
                    "Found {} object(s) in bucket '{}'",
                    keys.len(),
                    bucket
                ));
                Some(keys)
            }
            Err(e) => {
                self.report(&format!("listing objects in bucket '{}'", bucket), &e);
                None
            }
        }
    }

    /// Delete `folder ++ key`. Deleting an absent key succeeds.
    pub async fn delete_object(&self, bucket: &str, key: &str, folder: &str) -> bool {
        let effective_key = format!("{}{}", folder, key);
        self.logger.debug(&format!(
            "Deleting '{}' from bucket '{}'",
            effective_key, bucket
        ));
        match self.api.delete_object(bucket, &effective_key).await {
            Ok(()) => {
                self.logger.info(&format!(
                    "The file '{}' has been deleted from bucket '{}'",
                    effective_key, bucket
                ));
                true
            }
            Err(e) => {
                self.report(
                    &format!("deleting '{}' from bucket '{}'", effective_key, bucket),
                    &e,
                );
                false
            }
        }
    }

    /// Time-limited read URL for one object, passed through unmodified
    pub async fn generate_temporary_access_url(
        &self,
        bucket: &str,
        key: &str,
        expiration_seconds: u64,
    ) -> Option<String> {
        if expiration_seconds == 0 || expiration_seconds > MAX_URL_EXPIRATION {
            self.logger.error(&format!(
                "Cannot generate a URL for '{}': expiration must be between 1 and {} seconds, got {}",
                key, MAX_URL_EXPIRATION, expiration_seconds
            ));
            return None;
        }

        match self.api.presign_get(bucket, key, expiration_seconds).await {
            Ok(url) => {
                self.logger.info(&format!(
                    "Generated a URL for '{}' in bucket '{}' valid for {} seconds",
                    key, bucket, expiration_seconds
                ));
                Some(url)
            }
            Err(e) => {
                self.report(&format!("generating a URL for '{}'", key), &e);
                None
            }
        }
    }

    /// Store `data` at `folder ++ key`, replacing any existing object
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        folder: &str,
    ) -> bool {
        let effective_key = format!("{}{}", folder, key);
        let data = data.into();
        self.logger.debug(&format!(
            "Uploading {} bytes to '{}' in bucket '{}'",
            data.len(),
            effective_key,
            bucket
        ));
        match self.api.put_object(bucket, &effective_key, data).await {
            Ok(()) => {
                self.logger.info(&format!(
                    "The file '{}' has been uploaded to bucket '{}'",
                    effective_key, bucket
                ));
                true
            }
            Err(e) => {
                self.report(
                    &format!("uploading '{}' to bucket '{}'", effective_key, bucket),
                    &e,
                );
                false
            }
        }
    }

    /// Write the whole object to `destination`
    pub async fn download(&self, bucket: &str, key: &str, destination: impl AsRef<Path>) -> bool {
        let destination = destination.as_ref();
        self.logger.debug(&format!(
            "Downloading '{}' from bucket '{}' to {}",
            key,
            bucket,
            destination.display()
        ));

        let result = async {
            let data = self.api.get_object(bucket, key).await?;
            tokio::fs::write(destination, &data).await?;
            Ok::<_, RequestError>(data.len())
        }
        .await;

        match result {
            Ok(len) => {
                self.logger.info(&format!(
                    "Downloaded '{}' ({} bytes) to {}",
                    key,
                    len,
                    destination.display()
                ));
                true
            }
            Err(e) => {
                self.report(&format!("downloading '{}' from bucket '{}'", key, bucket), &e);
                false
            }
        }
    }

    /// Text content of `key`.
    ///
    /// Presence is decided by a listing scoped to `key` as a prefix, matched
    /// exactly; only then is the object fetched.
    pub async fn read(&self, bucket: &str, key: &str) -> ReadOutcome {
        self.logger
            .debug(&format!("Reading '{}' from bucket '{}'", key, bucket));

        let listed = match self.api.list_objects(bucket, Some(key)).await {
            Ok(keys) => keys,
            Err(e) => {
                self.report(&format!("reading '{}' from bucket '{}'", key, bucket), &e);
                return ReadOutcome::Failed(e.to_string());
            }
        };
        if !listed.iter().any(|k| k == key) {
            self.logger.warning(&format!(
                "The specified key '{}' does not exist in bucket '{}'.",
                key, bucket
            ));
            return ReadOutcome::NotPresent;
        }

        let content = async {
            let data = self.api.get_object(bucket, key).await?;
            Ok::<_, RequestError>(String::from_utf8(data.to_vec())?)
        }
        .await;

        match content {
            Ok(text) => {
                self.logger.info(&format!(
                    "File '{}' read successfully from bucket '{}'.",
                    key, bucket
                ));
                ReadOutcome::Found(text)
            }
            // Removed between the listing and the fetch
            Err(e) if e.is_not_found() => {
                self.logger.warning(&format!(
                    "The specified key '{}' does not exist in bucket '{}'.",
                    key, bucket
                ));
                ReadOutcome::NotPresent
            }
            Err(e) => {
                self.report(&format!("reading '{}' from bucket '{}'", key, bucket), &e);
                ReadOutcome::Failed(e.to_string())
            }
        }
    }

    /// Delete `key` and describe the outcome in a sentence
    pub async fn delete_and_report(&self, bucket: &str, key: &str) -> String {
        match self.api.delete_object(bucket, key).await {
            Ok(()) => {
                let message = format!(
                    "The file '{}' has been deleted from the bucket '{}'.",
                    key, bucket
                );
                self.logger.info(&message);
                message
            }
            Err(e) => {
                self.report(&format!("deleting '{}' from bucket '{}'", key, bucket), &e);
                match e.class() {
                    FailureClass::NotFound | FailureClass::Request => format!(
                        "Client Error: Unable to delete the file '{}' from the bucket '{}'.",
                        key, bucket
                    ),
                    FailureClass::Unexpected => format!(
                        "Error: Unexpected error occurred while deleting the file '{}' from the bucket '{}'.",
                        key, bucket
                    ),
                }
            }
        }
    }

    /// Server-side copy
    pub async fn copy(&self, src_bucket: &str, src_key: &str, dst_bucket: &str, dst_key: &str) -> bool {
        self.logger.debug(&format!(
            "Copying '{}/{}' to '{}/{}'",
            src_bucket, src_key, dst_bucket, dst_key
        ));
        match self
            .api
            .copy_object(src_bucket, src_key, dst_bucket, dst_key)
            .await
        {
            Ok(()) => {
                self.logger.info(&format!(
                    "The file '{}' has been copied from bucket '{}' to '{}' in bucket '{}'",
                    src_key, src_bucket, dst_key, dst_bucket
                ));
                true
            }
            Err(e) => {
                self.report(
                    &format!("copying '{}/{}' to '{}/{}'", src_bucket, src_key, dst_bucket, dst_key),
                    &e,
                );
                false
            }
        }
    }

    /// Copy, then delete the source.
    ///
    /// Not atomic: when the delete fails after the copy succeeded, both
    /// copies remain and nothing is rolled back.
    pub async fn move_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> bool {
        if !self.copy(src_bucket, src_key, dst_bucket, dst_key).await {
            return false;
        }

        match self.api.delete_object(src_bucket, src_key).await {
            Ok(()) => {
                self.logger.info(&format!(
                    "The file '{}' has been moved from bucket '{}' to '{}' in bucket '{}'",
                    src_key, src_bucket, dst_key, dst_bucket
                ));
                true
            }
            Err(e) => {
                self.report(
                    &format!(
                        "removing the source '{}/{}' after copying it; both copies remain",
                        src_bucket, src_key
                    ),
                    &e,
                );
                false
            }
        }
    }

    pub async fn set_access_control(&self, bucket: &str, key: &str, policy: CannedAcl) -> bool {
        match self.api.put_object_acl(bucket, key, policy).await {
            Ok(()) => {
                self.logger.info(&format!(
                    "Access policy of '{}' in bucket '{}' set to {}",
                    key, bucket, policy
                ));
                true
            }
            Err(e) => {
                self.report(&format!("setting the access policy of '{}'", key), &e);
                false
            }
        }
    }

    pub async fn get_object_metadata(&self, bucket: &str, key: &str) -> Option<ObjectMetadata> {
        match self.api.head_object(bucket, key).await {
            Ok(metadata) => {
                self.logger
                    .debug(&format!("Fetched metadata of '{}' in bucket '{}'", key, bucket));
                Some(metadata)
            }
            Err(e) => {
                self.report(&format!("fetching metadata of '{}' in bucket '{}'", key, bucket), &e);
                None
            }
        }
    }

    /// Turn versioning on (Enabled) or off (Suspended)
    pub async fn set_versioning(&self, bucket: &str, enabled: bool) -> bool {
        let status = VersioningStatus::from_enabled(enabled);
        match self.api.put_bucket_versioning(bucket, status).await {
            Ok(()) => {
                self.logger.info(&format!(
                    "Versioning of bucket '{}' set to {}",
                    bucket, status
                ));
                true
            }
            Err(e) => {
                self.report(&format!("setting versioning on bucket '{}'", bucket), &e);
                false
            }
        }
    }

    /// `Some(Unset)` for a bucket that never had versioning configured
    pub async fn get_versioning(&self, bucket: &str) -> Option<VersioningStatus> {
        match self.api.get_bucket_versioning(bucket).await {
            Ok(status) => Some(status),
            Err(e) => {
                self.report(&format!("reading versioning of bucket '{}'", bucket), &e);
                None
            }
        }
    }

    /// Request a restore for [`DEFAULT_RESTORE_DAYS`]; does not wait for it
    pub async fn restore_archived_object(&self, bucket: &str, key: &str) -> bool {
        self.restore_archived_object_for(bucket, key, DEFAULT_RESTORE_DAYS)
            .await
    }

    pub async fn restore_archived_object_for(&self, bucket: &str, key: &str, days: u32) -> bool {
        if days == 0 {
            self.logger
                .error(&format!("Cannot restore '{}': days must be at least 1", key));
            return false;
        }
        match self.api.restore_object(bucket, key, days).await {
            Ok(()) => {
                self.logger.info(&format!(
                    "Restore requested for '{}' in bucket '{}' for {} day(s)",
                    key, bucket, days
                ));
                true
            }
            Err(e) => {
                self.report(&format!("restoring '{}' in bucket '{}'", key, bucket), &e);
                false
            }
        }
    }

    /// Replace the bucket's whole CORS policy with `rules`
    pub async fn set_cors_policy(&self, bucket: &str, rules: &[CorsRule]) -> bool {
        match self.api.put_bucket_cors(bucket, rules).await {
            Ok(()) => {
                self.logger.info(&format!(
                    "CORS policy of bucket '{}' replaced with {} rule(s)",
                    bucket,
                    rules.len()
                ));
                true
            }
            Err(e) => {
                self.report(&format!("setting the CORS policy of bucket '{}'", bucket), &e);
                false
            }
        }
    }

    /// Current CORS rules; empty when the bucket has none
    pub async fn get_cors_policy(&self, bucket: &str) -> Option<Vec<CorsRule>> {
        match self.api.get_bucket_cors(bucket).await {
            Ok(rules) => Some(rules),
            Err(e) if e.code() == Some("NoSuchCORSConfiguration") => {
                self.logger
                    .info(&format!("Bucket '{}' has no CORS policy", bucket));
                Some(Vec::new())
            }
            Err(e) => {
                self.report(&format!("reading the CORS policy of bucket '{}'", bucket), &e);
                None
            }
        }
    }

    pub async fn get_encryption_config(&self, bucket: &str) -> Option<EncryptionConfig> {
        match self.api.get_bucket_encryption(bucket).await {
            Ok(config) => Some(config),
            Err(e) => {
                self.report(
                    &format!("reading the encryption configuration of bucket '{}'", bucket),
                    &e,
                );
                None
            }
        }
    }
}
