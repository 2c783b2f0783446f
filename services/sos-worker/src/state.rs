//! Running state of a worker.

use std::sync::Arc;

use sos_common::SosResult;
use sos_protocol::{CapabilitiesBuilder, CatalogSnapshot};

use crate::config::ServiceConfiguration;
use crate::factory::Stores;
use crate::registry::SensorRegistry;
use crate::store::{ObservationStore, StoreResult};

/// Everything a running worker serves requests from.
///
/// Built on init and dropped on destroy; requests in flight keep their
/// own `Arc` until they complete.
pub struct ServiceState {
    pub config: ServiceConfiguration,
    pub observations: Arc<dyn ObservationStore>,
    pub registry: SensorRegistry,
    pub capabilities: CapabilitiesBuilder,
}

impl ServiceState {
    pub async fn new(config: ServiceConfiguration, stores: Stores) -> StoreResult<Self> {
        let offerings = stores.observations.offerings().await?;
        let registry =
            SensorRegistry::seed(stores.sensors, &offerings, config.sensor_id_base.clone()).await?;
        let capabilities = CapabilitiesBuilder::new(
            config.service_identification.clone(),
            config.service_provider.clone(),
        )
        .transactional(config.is_transactional())
        .update_sequence(config.update_sequence.clone());

        Ok(Self {
            config,
            observations: stores.observations,
            registry,
            capabilities,
        })
    }

    /// Current catalog contents as advertised by GetCapabilities.
    pub async fn catalog_snapshot(&self) -> SosResult<CatalogSnapshot> {
        Ok(CatalogSnapshot {
            offerings: self.observations.offerings().await?,
            procedures: self.registry.registered().await,
            observed_properties: self
                .observations
                .observed_properties()
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect(),
            features: self
                .observations
                .features()
                .await?
                .into_iter()
                .map(|f| f.id)
                .collect(),
        })
    }
}
