//! Named SOS workers hosted by one process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{ConfigError, ServiceConfiguration};
use crate::factory::FactoryRegistry;
use crate::worker::SosWorker;

/// Registry of workers by service identifier.
pub struct ServiceManager {
    factories: Arc<FactoryRegistry>,
    workers: RwLock<HashMap<String, Arc<SosWorker>>>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new(Arc::new(FactoryRegistry::with_defaults()))
    }
}

impl ServiceManager {
    pub fn new(factories: Arc<FactoryRegistry>) -> Self {
        Self {
            factories,
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Initialize the worker `id`, creating it if needed.
    ///
    /// A worker that fails to start stays registered so that its requests
    /// report the cause.
    pub async fn start(
        &self,
        id: &str,
        config: Option<ServiceConfiguration>,
    ) -> Result<Arc<SosWorker>, ConfigError> {
        let worker = self.get_or_create(id).await;
        worker.init(config).await?;
        Ok(worker)
    }

    /// Like `start`, reading the configuration from a YAML file.
    pub async fn start_from_file(
        &self,
        id: &str,
        path: impl AsRef<Path>,
    ) -> Result<Arc<SosWorker>, ConfigError> {
        let worker = self.get_or_create(id).await;
        worker.init_from_file(path).await?;
        Ok(worker)
    }

    async fn get_or_create(&self, id: &str) -> Arc<SosWorker> {
        let mut workers = self.workers.write().await;
        let worker = workers.entry(id.to_string()).or_insert_with(|| {
            info!(worker = %id, "Created SOS worker");
            Arc::new(SosWorker::with_factories(id, Arc::clone(&self.factories)))
        });
        Arc::clone(worker)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SosWorker>> {
        self.workers.read().await.get(id).cloned()
    }

    /// Destroy a worker but keep it registered. Returns false if unknown.
    pub async fn stop(&self, id: &str) -> bool {
        match self.get(id).await {
            Some(worker) => {
                worker.destroy().await;
                true
            }
            None => false,
        }
    }

    /// Destroy and forget a worker.
    pub async fn remove(&self, id: &str) -> Option<Arc<SosWorker>> {
        let worker = self.workers.write().await.remove(id)?;
        worker.destroy().await;
        Some(worker)
    }

    /// Identifiers of every registered worker, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workers.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
