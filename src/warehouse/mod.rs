//! Data-warehouse clusters
//!
//! [`WarehouseHandler`] over the [`WarehouseApi`] capability, with
//! [`RedshiftClient`] as the network variant.

pub mod api;
pub mod client;
pub mod handler;

pub use api::{ClusterSpec, ClusterSummary, WarehouseApi};
pub use client::{RedshiftClient, REDSHIFT_API_VERSION};
pub use handler::WarehouseHandler;
