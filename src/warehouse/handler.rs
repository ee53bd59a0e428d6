//! Data-warehouse cluster handler

use crate::client::{ClientBinding, ClientFactory, ResourceFamily};
use crate::config::{self, CredentialBundle, CredentialResolver};
use crate::error::{ConfigError, FailureClass, RequestError};
use crate::logger::{self, OperationLogger};
use crate::warehouse::api::{ClusterSpec, ClusterSummary, WarehouseApi};
use crate::warehouse::client::RedshiftClient;
use std::sync::Arc;

pub struct WarehouseHandler<A: WarehouseApi = RedshiftClient> {
    api: A,
    logger: Arc<dyn OperationLogger>,
}

impl WarehouseHandler<RedshiftClient> {
    pub fn from_binding(binding: ClientBinding) -> Result<Self, ConfigError> {
        Ok(Self::new(RedshiftClient::from_binding(binding)?))
    }

    pub fn connect(bundle: &CredentialBundle, factory: &ClientFactory) -> Result<Self, ConfigError> {
        Self::from_binding(factory.build(bundle, ResourceFamily::Warehouse)?)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let bundle = CredentialResolver::new().resolve()?;
        let factory = ClientFactory::from_config(&config::load_from_env());
        Self::connect(&bundle, &factory)
    }
}

impl<A: WarehouseApi> WarehouseHandler<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
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

    fn report(&self, action: &str, err: &RequestError) {
        let prefix = match err.class() {
            FailureClass::NotFound | FailureClass::Request => "Error",
            FailureClass::Unexpected => "Unexpected error",
        };
        self.logger.error(&format!("{} {}: {}", prefix, action, err));
    }

    async fn describe(&self, identifier: Option<&str>, action: &str) -> Option<Vec<ClusterSummary>> {
        match self.api.describe_clusters(identifier).await {
            Ok(clusters) => Some(clusters),
            Err(e) => {
                self.report(action, &e);
                None
            }
        }
    }

    fn finish(&self, result: crate::error::Result<()>, success: String, action: String) -> bool {
        match result {
            Ok(()) => {
                self.logger.info(&success);
                true
            }
            Err(e) => {
                self.report(&action, &e);
                false
            }
        }
    }

    /// Identifiers of all clusters
    pub async fn list_clusters(&self) -> Option<Vec<String>> {
        let clusters = self.describe(None, "listing clusters").await?;
        Some(clusters.into_iter().map(|c| c.identifier).collect())
    }

    pub async fn create_cluster(&self, spec: &ClusterSpec) -> bool {
        let result = self.api.create_cluster(spec).await;
        self.finish(
            result,
            format!("Cluster {} created successfully.", spec.identifier),
            format!("creating cluster {}", spec.identifier),
        )
    }

    /// Delete a cluster without taking a final snapshot
    pub async fn delete_cluster(&self, identifier: &str) -> bool {
        let result = self.api.delete_cluster(identifier, true).await;
        self.finish(
            result,
            format!("Cluster {} deleted successfully.", identifier),
            format!("deleting cluster {}", identifier),
        )
    }

    /// Database names reported for `identifier`
    pub async fn list_databases(&self, identifier: &str) -> Option<Vec<String>> {
        let clusters = self
            .describe(
                Some(identifier),
                &format!("listing databases in cluster {}", identifier),
            )
            .await?;
        Some(clusters.into_iter().filter_map(|c| c.db_name).collect())
    }

    pub async fn modify_cluster(&self, identifier: &str, node_type: &str) -> bool {
        let result = self.api.modify_cluster(identifier, node_type).await;
        self.finish(
            result,
            format!("Modified cluster {} to node type {}.", identifier, node_type),
            format!("modifying cluster {}", identifier),
        )
    }

    pub async fn pause_cluster(&self, identifier: &str) -> bool {
        let result = self.api.pause_cluster(identifier).await;
        self.finish(
            result,
            format!("Cluster {} paused.", identifier),
            format!("pausing cluster {}", identifier),
        )
    }

    pub async fn resume_cluster(&self, identifier: &str) -> bool {
        let result = self.api.resume_cluster(identifier).await;
        self.finish(
            result,
            format!("Cluster {} resumed.", identifier),
            format!("resuming cluster {}", identifier),
        )
    }

    pub async fn get_cluster_status(&self, identifier: &str) -> Option<String> {
        let clusters = self
            .describe(
                Some(identifier),
                &format!("getting status of cluster {}", identifier),
            )
            .await?;
        let status = clusters.into_iter().next().and_then(|c| c.status);
        if status.is_none() {
            self.logger
                .warning(&format!("Cluster {} reported no status.", identifier));
        }
        status
    }

    pub async fn list_snapshots(&self, identifier: &str) -> Option<Vec<String>> {
        match self.api.describe_cluster_snapshots(identifier).await {
            Ok(snapshots) => Some(snapshots),
            Err(e) => {
                self.report(&format!("listing snapshots of cluster {}", identifier), &e);
                None
            }
        }
    }

    /// Restore `snapshot` into a new cluster named `new_cluster`
    pub async fn restore_snapshot(&self, snapshot: &str, new_cluster: &str) -> bool {
        let result = self
            .api
            .restore_from_cluster_snapshot(snapshot, new_cluster)
            .await;
        self.finish(
            result,
            format!("Cluster {} restored from snapshot {}.", new_cluster, snapshot),
            format!("restoring snapshot {}", snapshot),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogLevel, MemoryLogger};
    use async_trait::async_trait;
    use hyper::StatusCode;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Clusters kept in a map; snapshots keyed by cluster
    #[derive(Default)]
    struct FakeWarehouse {
        clusters: Mutex<BTreeMap<String, ClusterSummary>>,
        snapshots: BTreeMap<String, Vec<String>>,
        last_delete_skipped_snapshot: Mutex<Option<bool>>,
    }

    fn not_found(id: &str) -> RequestError {
        RequestError::service(StatusCode::NOT_FOUND, "ClusterNotFound", format!("{} not found", id))
    }

    impl FakeWarehouse {
        fn set_status(&self, id: &str, status: &str) -> crate::error::Result<()> {
            let mut clusters = self.clusters.lock().unwrap();
            let cluster = clusters.get_mut(id).ok_or_else(|| not_found(id))?;
            cluster.status = Some(status.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl WarehouseApi for FakeWarehouse {
        async fn describe_clusters(
            &self,
            identifier: Option<&str>,
        ) -> crate::error::Result<Vec<ClusterSummary>> {
            let clusters = self.clusters.lock().unwrap();
            match identifier {
                Some(id) => Ok(vec![clusters.get(id).cloned().ok_or_else(|| not_found(id))?]),
                None => Ok(clusters.values().cloned().collect()),
            }
        }

        async fn create_cluster(&self, spec: &ClusterSpec) -> crate::error::Result<()> {
            self.clusters.lock().unwrap().insert(
                spec.identifier.clone(),
                ClusterSummary {
                    identifier: spec.identifier.clone(),
                    status: Some("creating".into()),
                    db_name: Some(spec.db_name.clone()),
                    node_type: Some(spec.node_type.clone()),
                },
            );
            Ok(())
        }

        async fn delete_cluster(&self, id: &str, skip: bool) -> crate::error::Result<()> {
            *self.last_delete_skipped_snapshot.lock().unwrap() = Some(skip);
            self.clusters
                .lock()
                .unwrap()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| not_found(id))
        }

        async fn modify_cluster(&self, id: &str, node_type: &str) -> crate::error::Result<()> {
            let mut clusters = self.clusters.lock().unwrap();
            let cluster = clusters.get_mut(id).ok_or_else(|| not_found(id))?;
            cluster.node_type = Some(node_type.to_string());
            Ok(())
        }

        async fn pause_cluster(&self, id: &str) -> crate::error::Result<()> {
            self.set_status(id, "paused")
        }

        async fn resume_cluster(&self, id: &str) -> crate::error::Result<()> {
            self.set_status(id, "available")
        }

        async fn describe_cluster_snapshots(&self, id: &str) -> crate::error::Result<Vec<String>> {
            self.snapshots.get(id).cloned().ok_or_else(|| not_found(id))
        }

        async fn restore_from_cluster_snapshot(
            &self,
            snapshot: &str,
            new_cluster: &str,
        ) -> crate::error::Result<()> {
            let known = self.snapshots.values().flatten().any(|s| s == snapshot);
            if !known {
                return Err(RequestError::service(
                    StatusCode::NOT_FOUND,
                    "ClusterSnapshotNotFound",
                    "no such snapshot",
                ));
            }
            self.clusters.lock().unwrap().insert(
                new_cluster.to_string(),
                ClusterSummary {
                    identifier: new_cluster.to_string(),
                    status: Some("creating".into()),
                    ..Default::default()
                },
            );
            Ok(())
        }
    }

    fn make_handler(api: FakeWarehouse) -> (WarehouseHandler<FakeWarehouse>, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        (WarehouseHandler::new(api).with_logger(logger.clone()), logger)
    }

    #[tokio::test]
    async fn test_cluster_lifecycle() {
        let (handler, _) = make_handler(FakeWarehouse::default());
        let spec = ClusterSpec::new("analytics", "dc2.large", "dev", "admin", "Passw0rd!");

        assert!(handler.create_cluster(&spec).await);
        assert_eq!(handler.list_clusters().await, Some(vec!["analytics".to_string()]));
        assert_eq!(handler.list_databases("analytics").await, Some(vec!["dev".to_string()]));
        assert_eq!(handler.get_cluster_status("analytics").await.as_deref(), Some("creating"));

        assert!(handler.pause_cluster("analytics").await);
        assert_eq!(handler.get_cluster_status("analytics").await.as_deref(), Some("paused"));
        assert!(handler.resume_cluster("analytics").await);
        assert!(handler.modify_cluster("analytics", "ra3.xlplus").await);

        assert!(handler.delete_cluster("analytics").await);
        assert_eq!(*handler.api().last_delete_skipped_snapshot.lock().unwrap(), Some(true));
        assert_eq!(handler.list_clusters().await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_missing_cluster_is_logged() {
        let (handler, logger) = make_handler(FakeWarehouse::default());

        assert_eq!(handler.get_cluster_status("ghost").await, None);
        assert_eq!(handler.list_databases("ghost").await, None);
        assert!(!handler.pause_cluster("ghost").await);

        let errors = logger.messages_at(LogLevel::Error);
        assert_eq!(errors.len(), 3);
        assert!(errors[2].contains("ClusterNotFound"));
    }

    #[tokio::test]
    async fn test_snapshots_and_restore() {
        let mut snapshots = BTreeMap::new();
        snapshots.insert("analytics".to_string(), vec!["nightly-1".to_string()]);
        let (handler, _) = make_handler(FakeWarehouse {
            snapshots,
            ..Default::default()
        });

        assert_eq!(
            handler.list_snapshots("analytics").await,
            Some(vec!["nightly-1".to_string()])
        );
        assert!(handler.restore_snapshot("nightly-1", "analytics-copy").await);
        assert!(!handler.restore_snapshot("missing", "other").await);
        assert_eq!(
            handler.list_clusters().await,
            Some(vec!["analytics-copy".to_string()])
        );
    }
}
