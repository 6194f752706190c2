//! Opens live-cluster executors for the reconciler.

use async_trait::async_trait;
use cqlsync_controller::Connector;
use cqlsync_db::{BackendError, ConnectionConfig, StoreExecutor};

/// A new driver session per pass, from the manifest's connection details.
pub struct ClusterConnector {
    config: ConnectionConfig,
}

impl ClusterConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "scylla")]
#[async_trait]
impl Connector for ClusterConnector {
    async fn connect(&self) -> Result<Box<dyn StoreExecutor>, BackendError> {
        let executor = cqlsync_db::ScyllaExecutor::connect(&self.config).await?;
        Ok(Box::new(executor))
    }
}

#[cfg(not(feature = "scylla"))]
#[async_trait]
impl Connector for ClusterConnector {
    async fn connect(&self) -> Result<Box<dyn StoreExecutor>, BackendError> {
        Err(BackendError::NotAvailable(format!(
            "cannot reach {}: rebuild with the '{}' feature",
            self.config.known_node(),
            cqlsync_db::LIVE_BACKEND_FEATURE
        )))
    }
}
