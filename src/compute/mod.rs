//! Compute instances
//!
//! [`ComputeHandler`] over the [`ComputeApi`] capability, with [`Ec2Client`]
//! as the network variant.

pub mod api;
pub mod client;
pub mod handler;

pub use api::{ComputeApi, InstanceDescription, KeyPair, LaunchSpec};
pub use client::{Ec2Client, EC2_API_VERSION};
pub use handler::{ComputeHandler, NO_STATUS_INFO};
