use crate::storage::CannedAcl;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cloudrm - manage cloud storage, instances and warehouse clusters
#[derive(Parser, Debug)]
#[command(name = "cloudrm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (credentials come from the environment when absent)
    #[arg(long, global = true, env = "CLOUDRM_CONFIG")]
    pub config: Option<String>,

    /// Profile to use from config
    #[arg(long, global = true, env = "CLOUDRM_PROFILE")]
    pub profile: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Disable TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List buckets
    Buckets,

    /// Make bucket (s3://bucket) in the configured region
    Mb { bucket: String },

    /// Remove an empty bucket
    Rb { bucket: String },

    /// List objects (s3://bucket/prefix)
    Ls { path: String },

    /// Check whether an object exists
    Exists { path: String },

    /// Upload a local file
    Put {
        /// Local file
        file: PathBuf,

        /// Destination (s3://bucket/key); the key defaults to the file name
        dest: String,

        /// Prefix prepended to the key as-is
        #[arg(long, default_value = "")]
        folder: String,
    },

    /// Download an object to a local file
    Get { path: String, dest: PathBuf },

    /// Print an object as text
    Cat { path: String },

    /// Delete an object and report the outcome
    Rm { path: String },

    /// Server-side copy between two object paths
    Cp { source: String, dest: String },

    /// Copy, then delete the source
    Mv { source: String, dest: String },

    /// Print a temporary read URL
    Presign {
        path: String,

        /// Lifetime in seconds (1 to 604800)
        #[arg(long, default_value = "600")]
        expires: u64,
    },

    /// Show object metadata as JSON
    Stat { path: String },

    /// Set the canned access policy of an object
    Acl {
        path: String,

        /// private, public-read, public-read-write, authenticated-read,
        /// bucket-owner-read or bucket-owner-full-control
        policy: CannedAcl,
    },

    /// Show or change bucket versioning
    Versioning {
        bucket: String,

        #[arg(long, conflicts_with = "suspend")]
        enable: bool,

        #[arg(long)]
        suspend: bool,
    },

    /// Show the CORS policy, or replace it from a JSON rules file
    Cors {
        bucket: String,

        #[arg(long, value_name = "RULES_JSON")]
        set: Option<PathBuf>,
    },

    /// Show the default encryption configuration
    Encryption { bucket: String },

    /// Request a restore of an archived object
    Restore {
        path: String,

        #[arg(long, default_value = "1")]
        days: u32,
    },

    /// Show the state of a compute instance
    InstanceStatus { instance_id: String },

    /// List warehouse clusters
    Clusters,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Split `s3://bucket/key` (or mc-style `s3/bucket/key`) into bucket and key
pub fn parse_s3_path(path: &str) -> anyhow::Result<(String, Option<String>)> {
    let path = path.trim();

    let stripped = if let Some(p) = path.strip_prefix("s3://") {
        p
    } else if let Some(p) = path.strip_prefix("s3/") {
        p
    } else {
        anyhow::bail!("Invalid object path '{}'. Expected: s3://bucket/key", path);
    };

    let (bucket, key) = match stripped.split_once('/') {
        Some((bucket, key)) => (bucket, Some(key)),
        None => (stripped, None),
    };

    if bucket.is_empty() {
        anyhow::bail!("Bucket name cannot be empty");
    }

    Ok((
        bucket.to_string(),
        key.filter(|k| !k.is_empty()).map(str::to_string),
    ))
}

/// Bucket name given bare or as `s3://bucket`
pub fn parse_bucket(arg: &str) -> anyhow::Result<String> {
    if arg.starts_with("s3://") || arg.starts_with("s3/") {
        return Ok(parse_s3_path(arg)?.0);
    }
    let bucket = arg.trim().trim_end_matches('/');
    if bucket.is_empty() {
        anyhow::bail!("Bucket name cannot be empty");
    }
    Ok(bucket.to_string())
}

/// Like [`parse_s3_path`] but the key is mandatory
pub fn parse_object_path(path: &str) -> anyhow::Result<(String, String)> {
    match parse_s3_path(path)? {
        (bucket, Some(key)) => Ok((bucket, key)),
        (_, None) => anyhow::bail!("Object key required in '{}'", path),
    }
}
