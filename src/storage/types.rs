//! Storage types shared by the capability interface and the handler

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bucket versioning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningStatus {
    Enabled,
    Suspended,
    /// Versioning has never been configured on the bucket
    Unset,
}

impl VersioningStatus {
    /// The two states a caller can set
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            VersioningStatus::Enabled
        } else {
            VersioningStatus::Suspended
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VersioningStatus::Enabled => "Enabled",
            VersioningStatus::Suspended => "Suspended",
            VersioningStatus::Unset => "Unset",
        }
    }
}

impl fmt::Display for VersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canned access-control policy for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl CannedAcl {
    /// Value of the `x-amz-acl` header
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CannedAcl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(CannedAcl::Private),
            "public-read" => Ok(CannedAcl::PublicRead),
            "public-read-write" => Ok(CannedAcl::PublicReadWrite),
            "authenticated-read" => Ok(CannedAcl::AuthenticatedRead),
            "bucket-owner-read" => Ok(CannedAcl::BucketOwnerRead),
            "bucket-owner-full-control" => Ok(CannedAcl::BucketOwnerFullControl),
            other => Err(format!("unknown access policy '{}'", other)),
        }
    }
}

/// One CORS rule; a bucket policy is an ordered list of these
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<u32>,
}

impl CorsRule {
    pub fn new(
        allowed_origins: Vec<String>,
        allowed_methods: Vec<String>,
        allowed_headers: Vec<String>,
    ) -> Self {
        Self {
            allowed_origins,
            allowed_methods,
            allowed_headers,
            expose_headers: Vec::new(),
            max_age_seconds: None,
        }
    }
}

/// Default server-side encryption rule of a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionRule {
    /// `AES256`, `aws:kms` or `aws:kms:dsse`
    pub sse_algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_master_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_key_enabled: Option<bool>,
}

/// Server-side encryption configuration of a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub rules: Vec<EncryptionRule>,
}

/// Object metadata as reported by a HEAD request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// `None` means the default (standard) class
    pub storage_class: Option<String>,
    pub version_id: Option<String>,
    /// Restore status of an archived object, e.g. `ongoing-request="true"`
    pub restore: Option<String>,
    /// User-defined `x-amz-meta-*` values, keyed without the prefix
    pub metadata: BTreeMap<String, String>,
}

/// Storage classes that need a restore before the object can be read
pub const ARCHIVAL_STORAGE_CLASSES: &[&str] = &["GLACIER", "DEEP_ARCHIVE"];

pub fn is_archival(storage_class: Option<&str>) -> bool {
    storage_class.is_some_and(|class| ARCHIVAL_STORAGE_CLASSES.contains(&class))
}

/// Result of reading an object as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The object exists and its content decoded as UTF-8
    Found(String),
    /// The key is not in the bucket
    NotPresent,
    /// The request failed; the reason has been logged
    Failed(String),
}

impl ReadOutcome {
    /// Human-readable form of [`ReadOutcome::NotPresent`]
    pub const NOT_PRESENT: &'static str = "File not in bucket";

    pub fn content(&self) -> Option<&str> {
        match self {
            ReadOutcome::Found(content) => Some(content),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ReadOutcome::Found(_))
    }
}

impl fmt::Display for ReadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadOutcome::Found(content) => f.write_str(content),
            ReadOutcome::NotPresent => f.write_str(Self::NOT_PRESENT),
            ReadOutcome::Failed(reason) => write!(f, "read failed: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioning_only_two_settable_states() {
        assert_eq!(VersioningStatus::from_enabled(true), VersioningStatus::Enabled);
        assert_eq!(VersioningStatus::from_enabled(false), VersioningStatus::Suspended);
    }

    #[test]
    fn test_canned_acl_round_trip_names() {
        for acl in [
            CannedAcl::Private,
            CannedAcl::PublicRead,
            CannedAcl::BucketOwnerFullControl,
        ] {
            assert_eq!(acl.as_str().parse::<CannedAcl>().unwrap(), acl);
        }
        assert!("world-writable".parse::<CannedAcl>().is_err());
    }

    #[test]
    fn test_cors_rule_from_json() {
        let json = r#"[{"allowed_origins":["*"],"allowed_methods":["GET","PUT"]}]"#;
        let rules: Vec<CorsRule> = serde_json::from_str(json).unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].allowed_headers.is_empty());
        assert_eq!(rules[0].max_age_seconds, None);
    }

    #[test]
    fn test_read_outcome_display() {
        assert_eq!(ReadOutcome::NotPresent.to_string(), "File not in bucket");
        assert_eq!(ReadOutcome::Found("hi".into()).content(), Some("hi"));
        assert_eq!(ReadOutcome::Failed("x".into()).content(), None);
    }

    #[test]
    fn test_archival_classes() {
        assert!(is_archival(Some("GLACIER")));
        assert!(!is_archival(Some("STANDARD")));
        assert!(!is_archival(None));
    }
}
