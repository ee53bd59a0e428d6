//! cloudrm - uniform resource handlers for cloud object storage, compute
//! instances and data-warehouse clusters

pub mod cli;
pub mod client;
pub mod compute;
pub mod config;
pub mod error;
pub mod logger;
pub mod storage;
pub mod warehouse;

pub use client::{ClientBinding, ClientFactory, LocationConstraint, ResourceFamily};
pub use compute::ComputeHandler;
pub use config::{Config, CredentialBundle, CredentialResolver};
pub use error::{ConfigError, FailureClass, RequestError};
pub use logger::{LogLevel, OperationLogger};
pub use storage::{ReadOutcome, StorageHandler};
pub use warehouse::WarehouseHandler;
