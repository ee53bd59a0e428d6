//! Capability interface over the compute-instance service

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of a RunInstances request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub image_id: String,
    pub instance_type: String,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    pub min_count: u32,
    pub max_count: u32,
    /// Applied to the launched instances
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// One instance of `instance_type` from `image_id`
    pub fn new(image_id: impl Into<String>, instance_type: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            instance_type: instance_type.into(),
            key_name: None,
            security_group_ids: Vec::new(),
            min_count: 1,
            max_count: 1,
            tags: BTreeMap::new(),
        }
    }

    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    pub fn security_group(mut self, group_id: impl Into<String>) -> Self {
        self.security_group_ids.push(group_id.into());
        self
    }

    pub fn count(mut self, min: u32, max: u32) -> Self {
        self.min_count = min;
        self.max_count = max;
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Selected fields of one described instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub image_id: Option<String>,
    pub instance_type: Option<String>,
    /// `pending`, `running`, `stopping`, `stopped`, `shutting-down`, `terminated`
    pub state: Option<String>,
    pub key_name: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub launch_time: Option<String>,
    pub availability_zone: Option<String>,
}

/// A newly created key pair. `material` is only ever returned once.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub name: String,
    pub fingerprint: String,
    pub material: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("name", &self.name)
            .field("fingerprint", &self.fingerprint)
            .field("material", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Launch instances; returns their ids in launch order
    async fn run_instances(&self, spec: &LaunchSpec) -> Result<Vec<String>>;

    async fn stop_instance(&self, instance_id: &str) -> Result<()>;

    async fn start_instance(&self, instance_id: &str) -> Result<()>;

    async fn reboot_instance(&self, instance_id: &str) -> Result<()>;

    async fn terminate_instance(&self, instance_id: &str) -> Result<()>;

    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceDescription>;

    /// State name from the status API; `None` when it reports nothing for the instance
    async fn describe_instance_status(&self, instance_id: &str) -> Result<Option<String>>;

    /// Returns the new image id
    async fn create_image(
        &self,
        instance_id: &str,
        name: &str,
        description: &str,
        no_reboot: bool,
    ) -> Result<String>;

    async fn modify_instance_type(&self, instance_id: &str, instance_type: &str) -> Result<()>;

    async fn attach_volume(&self, instance_id: &str, volume_id: &str, device: &str) -> Result<()>;

    async fn detach_volume(&self, instance_id: &str, volume_id: &str) -> Result<()>;

    async fn create_key_pair(&self, name: &str) -> Result<KeyPair>;

    async fn delete_key_pair(&self, name: &str) -> Result<()>;

    /// Names of all key pairs
    async fn describe_key_pairs(&self) -> Result<Vec<String>>;
}
