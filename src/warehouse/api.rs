//! Capability interface over the data-warehouse service

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters of a CreateCluster request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub identifier: String,
    pub node_type: String,
    pub db_name: String,
    pub master_username: String,
    pub master_password: String,
    /// One node makes a single-node cluster
    #[serde(default = "default_number_of_nodes")]
    pub number_of_nodes: u32,
}

fn default_number_of_nodes() -> u32 {
    1
}

impl ClusterSpec {
    pub fn new(
        identifier: impl Into<String>,
        node_type: impl Into<String>,
        db_name: impl Into<String>,
        master_username: impl Into<String>,
        master_password: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            node_type: node_type.into(),
            db_name: db_name.into(),
            master_username: master_username.into(),
            master_password: master_password.into(),
            number_of_nodes: default_number_of_nodes(),
        }
    }
}

impl std::fmt::Debug for ClusterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSpec")
            .field("identifier", &self.identifier)
            .field("node_type", &self.node_type)
            .field("db_name", &self.db_name)
            .field("master_username", &self.master_username)
            .field("master_password", &"<redacted>")
            .field("number_of_nodes", &self.number_of_nodes)
            .finish()
    }
}

/// Selected fields of one described cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub identifier: String,
    /// `creating`, `available`, `paused`, `deleting`, ...
    pub status: Option<String>,
    pub db_name: Option<String>,
    pub node_type: Option<String>,
}

#[async_trait]
pub trait WarehouseApi: Send + Sync {
    /// All clusters, or only `identifier` when given
    async fn describe_clusters(&self, identifier: Option<&str>) -> Result<Vec<ClusterSummary>>;

    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<()>;

    async fn delete_cluster(&self, identifier: &str, skip_final_snapshot: bool) -> Result<()>;

    async fn modify_cluster(&self, identifier: &str, node_type: &str) -> Result<()>;

    async fn pause_cluster(&self, identifier: &str) -> Result<()>;

    async fn resume_cluster(&self, identifier: &str) -> Result<()>;

    /// Snapshot identifiers of one cluster
    async fn describe_cluster_snapshots(&self, identifier: &str) -> Result<Vec<String>>;

    async fn restore_from_cluster_snapshot(&self, snapshot: &str, new_cluster: &str) -> Result<()>;
}
