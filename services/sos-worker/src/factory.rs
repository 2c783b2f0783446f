//! Store factories resolved by name from the configuration.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{ConfigError, ServiceConfiguration, StoreSection};
use crate::memory::{CatalogFile, MemoryObservationStore, MemorySensorStore};
use crate::store::{ObservationStore, SensorDescriptionStore, StoreResult};

/// The stores backing one worker.
#[derive(Clone)]
pub struct Stores {
    pub observations: Arc<dyn ObservationStore>,
    pub sensors: Arc<dyn SensorDescriptionStore>,
}

/// Builds the stores described by a configuration.
#[async_trait]
pub trait SosFactory: Send + Sync {
    fn name(&self) -> &str;

    async fn create(&self, config: &ServiceConfiguration) -> StoreResult<Stores>;
}

/// Factories available to workers, by name.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn SosFactory>>,
}

impl FactoryRegistry {
    /// Registry without any factory.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in factories.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(MemoryFactory));
        registry
    }

    pub fn register(&mut self, factory: Arc<dyn SosFactory>) {
        self.factories.insert(factory.name().to_string(), factory);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the configured factory and build its stores.
    pub async fn build(&self, config: &ServiceConfiguration) -> Result<Stores, ConfigError> {
        let factory = self.factories.get(&config.factory).ok_or_else(|| {
            ConfigError::Factory(format!(
                " No factory named '{}' is registered (available: {}).",
                config.factory,
                self.names().join(", ")
            ))
        })?;

        factory
            .create(config)
            .await
            .map_err(|e| ConfigError::Factory(format!(" {}", e)))
    }
}

/// Factory of the in-memory stores.
pub struct MemoryFactory;

impl MemoryFactory {
    fn load(section: Option<&StoreSection>) -> StoreResult<Option<CatalogFile>> {
        match section.and_then(|s| s.data_file.as_deref()) {
            Some(path) => CatalogFile::load(Path::new(path)).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SosFactory for MemoryFactory {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, config: &ServiceConfiguration) -> StoreResult<Stores> {
        let observations = match Self::load(config.om.as_ref())? {
            Some(catalog) => {
                MemoryObservationStore::from_catalog(catalog, config.observation_id_base.clone())?
            }
            None => MemoryObservationStore::new(config.observation_id_base.clone()),
        };
        let sensors = match Self::load(config.sml.as_ref())? {
            Some(catalog) => MemorySensorStore::from_catalog(&catalog),
            None => MemorySensorStore::new(),
        };

        Ok(Stores {
            observations: Arc::new(observations),
            sensors: Arc::new(sensors),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_unknown_factory() {
        let config = ServiceConfiguration {
            factory: "postgres".to_string(),
            ..Default::default()
        };
        let err = FactoryRegistry::with_defaults().build(&config).await.err().unwrap();
        let message = err.to_string();
        assert!(message.starts_with("Unable to find a SOS Factory."));
        assert!(message.contains("postgres"));
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let err = FactoryRegistry::empty()
            .build(&ServiceConfiguration::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Factory(_)));
    }

    #[tokio::test]
    async fn test_memory_factory_without_files() {
        let stores = FactoryRegistry::with_defaults()
            .build(&ServiceConfiguration::default())
            .await
            .unwrap();
        assert!(stores.observations.offerings().await.unwrap().is_empty());
        assert!(stores.sensors.procedures().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_data_file_is_factory_failure() {
        let config = ServiceConfiguration {
            om: Some(StoreSection {
                data_file: Some(PathBuf::from("/nonexistent/catalog.yaml")),
            }),
            ..Default::default()
        };
        let err = FactoryRegistry::with_defaults().build(&config).await.err().unwrap();
        assert!(err.to_string().contains("/nonexistent/catalog.yaml"));
    }
}
