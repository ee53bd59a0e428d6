//! Object storage: buckets and objects
//!
//! - [`StorageApi`]: the request shapes a handler needs
//! - [`S3Client`]: network variant over the signed transport
//! - [`MemoryStorage`]: scriptable in-memory variant
//! - [`StorageHandler`]: classified, logged operations over either

pub mod api;
pub mod client;
pub mod handler;
pub mod memory;
pub mod types;

pub use api::StorageApi;
pub use client::S3Client;
pub use handler::{StorageHandler, DEFAULT_RESTORE_DAYS, DEFAULT_URL_EXPIRATION, MAX_URL_EXPIRATION};
pub use memory::{MemoryStorage, Op};
pub use types::{
    CannedAcl, CorsRule, EncryptionConfig, EncryptionRule, ObjectMetadata, ReadOutcome,
    VersioningStatus,
};
