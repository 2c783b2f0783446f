//! Sensor lifecycle: registration, description and deletion.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use sos_common::{SosError, SosResult};
use sos_protocol::locators;
use sos_protocol::{Offering, Procedure, ProcedureState, SensorDescription};

use crate::memory::next_suffix;
use crate::store::{ObservationStore, SensorDescriptionStore, StoreResult};

const OFFERING_BASE: &str = "offering-";

#[derive(Default)]
struct RegistryState {
    /// Every procedure ever seen, in registration order.
    order: Vec<String>,
    procedures: HashMap<String, Procedure>,
    next_suffix: u64,
}

impl RegistryState {
    fn upsert(&mut self, procedure: Procedure) {
        if !self.procedures.contains_key(&procedure.id) {
            self.order.push(procedure.id.clone());
        }
        self.procedures.insert(procedure.id.clone(), procedure);
    }

    fn is_registered(&self, id: &str) -> bool {
        self.procedures.get(id).is_some_and(Procedure::is_registered)
    }
}

/// Tracks which procedures exist and owns their descriptions.
pub struct SensorRegistry {
    state: RwLock<RegistryState>,
    sensors: Arc<dyn SensorDescriptionStore>,
    id_base: String,
}

fn last_segment(id: &str) -> &str {
    id.rsplit([':', '/']).next().unwrap_or(id)
}

fn not_registered(procedure: &str) -> SosError {
    SosError::invalid(
        locators::PROCEDURE,
        format!("The sensor {}: this sensor is not registered", procedure),
    )
}

impl SensorRegistry {
    /// Seed from the stored descriptions and the procedures advertised by
    /// the offerings.
    pub async fn seed(
        sensors: Arc<dyn SensorDescriptionStore>,
        offerings: &[Offering],
        id_base: impl Into<String>,
    ) -> StoreResult<Self> {
        let id_base = id_base.into();
        let mut state = RegistryState::default();

        for id in sensors.procedures().await? {
            state.upsert(Procedure::registered(id));
        }
        for offering in offerings {
            for id in &offering.procedures {
                match state.procedures.get_mut(id) {
                    Some(procedure) => {
                        procedure.offering.get_or_insert_with(|| offering.id.clone());
                    }
                    None => state.upsert(Procedure {
                        offering: Some(offering.id.clone()),
                        ..Procedure::registered(id.clone())
                    }),
                }
            }
        }
        state.next_suffix = next_suffix(&id_base, state.order.iter().map(String::as_str));

        Ok(Self {
            state: RwLock::new(state),
            sensors,
            id_base,
        })
    }

    pub async fn is_registered(&self, id: &str) -> bool {
        self.state.read().await.is_registered(id)
    }

    /// Registered procedures, in registration order.
    pub async fn registered(&self) -> Vec<String> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter(|id| state.is_registered(id))
            .cloned()
            .collect()
    }

    pub async fn procedure(&self, id: &str) -> Option<Procedure> {
        self.state.read().await.procedures.get(id).cloned()
    }

    /// Register a new procedure and store its description.
    ///
    /// The identifier is the one declared by the description, or the next
    /// `{id_base}{n}`.
    pub async fn register(
        &self,
        description: SensorDescription,
        offering: Option<String>,
    ) -> SosResult<String> {
        let mut state = self.state.write().await;
        let id = self.allocate(&mut state, &description)?;
        self.store_description(&id, description).await?;
        self.commit(&mut state, &id, offering);
        Ok(id)
    }

    /// Register a new procedure together with an offering of its own.
    ///
    /// The offering is `offering-{last id segment}`, or the next free
    /// `offering-{n}` when that one exists. Nothing is kept if either step
    /// fails.
    pub async fn register_with_offering(
        &self,
        description: SensorDescription,
        observations: &dyn ObservationStore,
        mut offering: Offering,
    ) -> SosResult<(String, String)> {
        let mut state = self.state.write().await;
        let id = self.allocate(&mut state, &description)?;

        let existing: Vec<String> = observations
            .offerings()
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
        let mut offering_id = format!("{}{}", OFFERING_BASE, last_segment(&id));
        if existing.contains(&offering_id) {
            offering_id = format!(
                "{}{}",
                OFFERING_BASE,
                next_suffix(OFFERING_BASE, existing.iter().map(String::as_str))
            );
        }

        self.store_description(&id, description).await?;

        offering.id = offering_id.clone();
        offering.procedures = vec![id.clone()];
        if let Err(e) = observations.create_offering(offering).await {
            if let Err(cleanup) = self.sensors.remove(&id).await {
                warn!(procedure = %id, error = %cleanup, "Failed to drop description");
            }
            return Err(e.into());
        }

        self.commit(&mut state, &id, Some(offering_id.clone()));
        Ok((id, offering_id))
    }

    fn allocate(&self, state: &mut RegistryState, description: &SensorDescription) -> SosResult<String> {
        match description.procedure.as_deref() {
            Some(declared) if state.is_registered(declared) => Err(SosError::invalid(
                locators::PROCEDURE,
                format!("The sensor {} is already registered", declared),
            )),
            Some(declared) => Ok(declared.to_string()),
            None => loop {
                let candidate = format!("{}{}", self.id_base, state.next_suffix);
                state.next_suffix += 1;
                if !state.procedures.contains_key(&candidate) {
                    break Ok(candidate);
                }
            },
        }
    }

    async fn store_description(&self, id: &str, description: SensorDescription) -> SosResult<()> {
        let description = SensorDescription {
            procedure: Some(id.to_string()),
            ..description
        };
        Ok(self.sensors.put(id, description).await?)
    }

    fn commit(&self, state: &mut RegistryState, id: &str, offering: Option<String>) {
        state.upsert(Procedure {
            id: id.to_string(),
            state: ProcedureState::Registered,
            offering,
        });
        state.next_suffix = state
            .next_suffix
            .max(next_suffix(&self.id_base, std::iter::once(id)));

        info!(procedure = %id, "Registered sensor");
    }

    /// Stored description of a registered procedure.
    pub async fn describe(&self, id: &str) -> SosResult<SensorDescription> {
        let state = self.state.read().await;
        if !state.is_registered(id) {
            return Err(not_registered(id));
        }

        let description = self.sensors.get(id).await?.ok_or_else(|| {
            SosError::no_applicable_code(
                Some(locators::PROCEDURE),
                format!("No description is stored for the sensor {}", id),
            )
        })?;
        Ok(SensorDescription {
            procedure: Some(id.to_string()),
            ..description
        })
    }

    /// Mark a procedure deleted and drop its description.
    pub async fn delete(&self, id: &str) -> SosResult<()> {
        let mut state = self.state.write().await;
        if !state.is_registered(id) {
            return Err(not_registered(id));
        }

        self.sensors.remove(id).await?;
        if let Some(procedure) = state.procedures.get_mut(id) {
            procedure.state = ProcedureState::Deleted;
        }

        info!(procedure = %id, "Deleted sensor");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryObservationStore, MemorySensorStore};
    use sos_common::ExceptionCode;
    use sos_protocol::formats;

    const BASE: &str = "urn:ogc:object:sensor:GEOM:";

    fn description(procedure: Option<&str>) -> SensorDescription {
        SensorDescription {
            procedure: procedure.map(str::to_string),
            format: formats::SENSORML_1_0_1.to_string(),
            content: "<sml:SensorML/>".to_string(),
        }
    }

    async fn registry() -> SensorRegistry {
        let mut offering = Offering::new("offering-3");
        offering.procedures = vec![format!("{}3", BASE), format!("{}11", BASE)];
        SensorRegistry::seed(Arc::new(MemorySensorStore::new()), &[offering], BASE)
            .await
            .unwrap()
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("urn:ogc:object:sensor:GEOM:12"), "12");
        assert_eq!(last_segment("http://example.org/sensors/buoy-7"), "buoy-7");
        assert_eq!(last_segment("plain"), "plain");
    }

    #[tokio::test]
    async fn test_seeded_from_offerings() {
        let registry = registry().await;
        assert!(registry.is_registered("urn:ogc:object:sensor:GEOM:3").await);
        let procedure = registry.procedure("urn:ogc:object:sensor:GEOM:11").await.unwrap();
        assert_eq!(procedure.offering.as_deref(), Some("offering-3"));
    }

    #[tokio::test]
    async fn test_generated_ids_follow_highest_suffix() {
        let registry = registry().await;
        let id = registry.register(description(None), None).await.unwrap();
        assert_eq!(id, "urn:ogc:object:sensor:GEOM:12");
        let id = registry.register(description(None), None).await.unwrap();
        assert_eq!(id, "urn:ogc:object:sensor:GEOM:13");

        registry
            .register(description(Some("urn:ogc:object:sensor:GEOM:40")), None)
            .await
            .unwrap();
        let id = registry.register(description(None), None).await.unwrap();
        assert_eq!(id, "urn:ogc:object:sensor:GEOM:41");
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = registry().await;
        let err = registry
            .register(description(Some("urn:ogc:object:sensor:GEOM:3")), None)
            .await
            .unwrap_err();
        assert_eq!(err.exception_code(), ExceptionCode::InvalidParameterValue);
        assert_eq!(err.locator(), Some("procedure"));
    }

    #[tokio::test]
    async fn test_delete_then_describe() {
        let registry = registry().await;
        let id = registry.register(description(None), None).await.unwrap();
        assert_eq!(registry.describe(&id).await.unwrap().procedure, Some(id.clone()));

        registry.delete(&id).await.unwrap();
        let err = registry.describe(&id).await.unwrap_err();
        assert!(err.message().contains("this sensor is not registered"));
        assert_eq!(err.locator(), Some("procedure"));

        let err = registry.delete(&id).await.unwrap_err();
        assert_eq!(err.exception_code(), ExceptionCode::InvalidParameterValue);
        assert!(!registry.registered().await.contains(&id));
    }

    #[tokio::test]
    async fn test_offering_id_collision() {
        let registry = registry().await;
        let observations = MemoryObservationStore::new(BASE);
        observations.create_offering(Offering::new("offering-3")).await.unwrap();

        let (id, offering) = registry
            .register_with_offering(
                description(Some("urn:other:sensor:3")),
                &observations,
                Offering::new(""),
            )
            .await
            .unwrap();
        assert_eq!(id, "urn:other:sensor:3");
        assert_eq!(offering, "offering-4");

        let untouched = observations.offering("offering-3").await.unwrap().unwrap();
        assert!(untouched.procedures.is_empty());
        let created = observations.offering("offering-4").await.unwrap().unwrap();
        assert_eq!(created.procedures, vec![id.clone()]);
        let procedure = registry.procedure(&id).await.unwrap();
        assert_eq!(procedure.offering.as_deref(), Some("offering-4"));

        let (id, offering) = registry
            .register_with_offering(description(None), &observations, Offering::new(""))
            .await
            .unwrap();
        assert_eq!(id, "urn:ogc:object:sensor:GEOM:12");
        assert_eq!(offering, "offering-12");
    }

    #[tokio::test]
    async fn test_deleted_ids_not_regenerated() {
        let registry = registry().await;
        let first = registry.register(description(None), None).await.unwrap();
        registry.delete(&first).await.unwrap();
        let second = registry.register(description(None), None).await.unwrap();
        assert_ne!(first, second);
    }
}
