//! Data-warehouse client over the query protocol

use crate::client::{xml, ClientBinding, QueryClient, QueryParams, ResourceFamily};
use crate::error::{ConfigError, RequestError, Result};
use crate::warehouse::api::{ClusterSpec, ClusterSummary, WarehouseApi};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Query API version the requests are written against
pub const REDSHIFT_API_VERSION: &str = "2012-12-01";

pub struct RedshiftClient {
    query: QueryClient,
}

impl RedshiftClient {
    pub fn from_binding(binding: ClientBinding) -> std::result::Result<Self, ConfigError> {
        let (endpoint, transport) = binding.into_transport(ResourceFamily::Warehouse)?;
        Ok(Self {
            query: QueryClient::new(endpoint, REDSHIFT_API_VERSION, transport),
        })
    }

    fn cluster_params(identifier: &str) -> QueryParams {
        QueryParams::new().with("ClusterIdentifier", identifier)
    }

    fn create_cluster_params(spec: &ClusterSpec) -> QueryParams {
        let mut params = Self::cluster_params(&spec.identifier);
        params
            .push("NodeType", spec.node_type.as_str())
            .push("DBName", spec.db_name.as_str())
            .push("MasterUsername", spec.master_username.as_str())
            .push("MasterUserPassword", spec.master_password.as_str());
        if spec.number_of_nodes > 1 {
            params
                .push("ClusterType", "multi-node")
                .push("NumberOfNodes", spec.number_of_nodes.to_string());
        } else {
            params.push("ClusterType", "single-node");
        }
        params
    }

    /// Collect one summary per `<Cluster>` directly inside `<Clusters>`
    fn parse_clusters(xml_data: &[u8]) -> Result<Vec<ClusterSummary>> {
        let mut reader = Reader::from_reader(xml_data);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut clusters = Vec::new();
        let mut stack: Vec<Vec<u8>> = Vec::with_capacity(8);
        let mut current: Option<ClusterSummary> = None;
        let mut current_text = String::with_capacity(64);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = e.local_name().as_ref().to_vec();
                    if name == b"Cluster"
                        && stack.last().map(Vec::as_slice) == Some(b"Clusters".as_slice())
                    {
                        current = Some(ClusterSummary::default());
                    }
                    stack.push(name);
                    current_text.clear();
                }
                Ok(Event::Text(e)) => {
                    current_text.clear();
                    current_text.push_str(&e.unescape()?);
                }
                Ok(Event::End(_)) => {
                    let name = stack.pop().unwrap_or_default();
                    let parent_is_cluster =
                        stack.last().map(Vec::as_slice) == Some(b"Cluster".as_slice());

                    if name == b"Cluster"
                        && stack.last().map(Vec::as_slice) == Some(b"Clusters".as_slice())
                    {
                        if let Some(cluster) = current.take() {
                            clusters.push(cluster);
                        }
                    } else if let (Some(cluster), true) = (current.as_mut(), parent_is_cluster) {
                        let value = std::mem::take(&mut current_text);
                        match name.as_slice() {
                            b"ClusterIdentifier" => cluster.identifier = value,
                            b"ClusterStatus" => cluster.status = Some(value),
                            b"DBName" => cluster.db_name = Some(value),
                            b"NodeType" => cluster.node_type = Some(value),
                            _ => {}
                        }
                    }
                    current_text.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(RequestError::XmlParse(e.to_string())),
                _ => {}
            }
        }

        Ok(clusters)
    }
}

#[async_trait]
impl WarehouseApi for RedshiftClient {
    async fn describe_clusters(&self, identifier: Option<&str>) -> Result<Vec<ClusterSummary>> {
        let params = match identifier {
            Some(id) => Self::cluster_params(id),
            None => QueryParams::new(),
        };
        let body = self.query.call("DescribeClusters", &params).await?;
        Self::parse_clusters(&body)
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<()> {
        self.query
            .call("CreateCluster", &Self::create_cluster_params(spec))
            .await?;
        Ok(())
    }

    async fn delete_cluster(&self, identifier: &str, skip_final_snapshot: bool) -> Result<()> {
        let params = Self::cluster_params(identifier)
            .with("SkipFinalClusterSnapshot", skip_final_snapshot.to_string());
        self.query.call("DeleteCluster", &params).await?;
        Ok(())
    }

    async fn modify_cluster(&self, identifier: &str, node_type: &str) -> Result<()> {
        let params = Self::cluster_params(identifier).with("NodeType", node_type);
        self.query.call("ModifyCluster", &params).await?;
        Ok(())
    }

    async fn pause_cluster(&self, identifier: &str) -> Result<()> {
        self.query
            .call("PauseCluster", &Self::cluster_params(identifier))
            .await?;
        Ok(())
    }

    async fn resume_cluster(&self, identifier: &str) -> Result<()> {
        self.query
            .call("ResumeCluster", &Self::cluster_params(identifier))
            .await?;
        Ok(())
    }

    async fn describe_cluster_snapshots(&self, identifier: &str) -> Result<Vec<String>> {
        let body = self
            .query
            .call("DescribeClusterSnapshots", &Self::cluster_params(identifier))
            .await?;
        xml::texts_at(&body, &["Snapshots", "Snapshot", "SnapshotIdentifier"])
    }

    async fn restore_from_cluster_snapshot(&self, snapshot: &str, new_cluster: &str) -> Result<()> {
        let params = Self::cluster_params(new_cluster).with("SnapshotIdentifier", snapshot);
        self.query
            .call("RestoreFromClusterSnapshot", &params)
            .await?;
        Ok(())
    }
}
