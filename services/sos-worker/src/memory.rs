//! In-memory stores, optionally seeded from a YAML catalog file.
//!
//! ```yaml
//! offerings:
//!   - id: offering-3
//!     procedures: ["urn:ogc:object:sensor:GEOM:3"]
//!     observed_properties: ["urn:ogc:def:phenomenon:GEOM:depth"]
//!     features_of_interest: ["station-3"]
//! observed_properties:
//!   - id: urn:ogc:def:phenomenon:GEOM:depth
//! features:
//!   - id: station-3
//!     geometry: { x: -4.14, y: 48.39 }
//! observations:
//!   - procedure: urn:ogc:object:sensor:GEOM:3
//!     observed_property: urn:ogc:def:phenomenon:GEOM:depth
//!     feature_of_interest: station-3
//!     result: "2007-05-01T02:59:00.0,6.56@@2007-05-01T03:59:00.0,6.56@@"
//! sensors:
//!   - procedure: urn:ogc:object:sensor:GEOM:3
//!     content: "<sml:SensorML>...</sml:SensorML>"
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

use sos_common::{BoundingBox, TimePeriod};
use sos_protocol::codec;
use sos_protocol::formats;
use sos_protocol::{
    FeatureOfInterest, Observation, ObservedProperty, Offering, ResultBlock, ResultStructure,
    SensorDescription, TextEncoding,
};

use crate::store::{
    ObservationFilter, ObservationStore, SensorDescriptionStore, StoreError, StoreResult,
};

/// Contents of a catalog seed file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub offerings: Vec<Offering>,
    #[serde(default)]
    pub observed_properties: Vec<ObservedProperty>,
    #[serde(default)]
    pub features: Vec<FeatureOfInterest>,
    #[serde(default)]
    pub observations: Vec<ObservationRecord>,
    #[serde(default)]
    pub sensors: Vec<SensorRecord>,
}

/// A stored observation with its result in text encoding.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub procedure: String,
    pub observed_property: String,
    #[serde(default)]
    pub feature_of_interest: Option<String>,
    pub result: String,
}

/// A stored sensor description.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorRecord {
    pub procedure: String,
    #[serde(default = "default_sensor_format")]
    pub format: String,
    #[serde(default)]
    pub content: String,
}

fn default_sensor_format() -> String {
    formats::SENSORML_1_0_1.to_string()
}

impl CatalogFile {
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            offerings = catalog.offerings.len(),
            observations = catalog.observations.len(),
            sensors = catalog.sensors.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    pub fn from_yaml(content: &str) -> StoreResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Decode the observation records against the catalog phenomena.
    fn decode_observations(&self) -> StoreResult<Vec<Observation>> {
        self.observations
            .iter()
            .map(|record| {
                let structure = structure_for(&self.observed_properties, &record.observed_property);
                let encoding = TextEncoding::default();
                let rows = codec::decode(&record.result, &structure, &encoding).map_err(|e| {
                    StoreError::Parse(format!(
                        "observation of {} has an invalid result: {}",
                        record.procedure, e
                    ))
                })?;
                let mut observation = Observation::from_rows(
                    record.procedure.clone(),
                    record.observed_property.clone(),
                    record.feature_of_interest.clone(),
                    ResultBlock::new(structure, encoding, rows),
                )
                .ok_or_else(|| {
                    StoreError::Parse(format!("observation of {} has no rows", record.procedure))
                })?;
                observation.id = record.id.clone();
                Ok(observation)
            })
            .collect()
    }
}

/// Result structure of a phenomenon: one column per component.
fn structure_for(properties: &[ObservedProperty], property: &str) -> ResultStructure {
    match properties.iter().find(|p| p.id == property) {
        Some(p) if p.is_composite() => ResultStructure::for_properties(&p.components),
        _ => ResultStructure::for_properties(&[property]),
    }
}

struct Catalog {
    offerings: Vec<Offering>,
    properties: Vec<ObservedProperty>,
    features: Vec<FeatureOfInterest>,
    observations: Vec<Observation>,
    next_id: u64,
}

impl Catalog {
    fn property(&self, id: &str) -> Option<&ObservedProperty> {
        self.properties.iter().find(|p| p.id == id)
    }

    fn feature(&self, id: &str) -> Option<&FeatureOfInterest> {
        self.features.iter().find(|f| f.id == id)
    }

    /// `requested` names the observation's phenomenon, a composite
    /// containing it, or a component of it.
    fn property_matches(&self, requested: &str, observed: &str) -> bool {
        requested == observed
            || self.property(requested).is_some_and(|p| p.covers(observed))
            || self.property(observed).is_some_and(|p| p.covers(requested))
    }

    fn matches(&self, filter: &ObservationFilter, observation: &Observation) -> bool {
        if !filter.offerings.is_empty()
            && !self
                .offerings
                .iter()
                .filter(|o| filter.offerings.contains(&o.id))
                .any(|o| o.has_procedure(&observation.procedure))
        {
            return false;
        }
        if !filter.procedures.is_empty() && !filter.procedures.contains(&observation.procedure) {
            return false;
        }
        if !filter.observed_properties.is_empty()
            && !filter
                .observed_properties
                .iter()
                .any(|p| self.property_matches(p, &observation.observed_property))
        {
            return false;
        }
        if !filter.features_of_interest.is_empty()
            && !observation
                .feature_of_interest
                .as_ref()
                .is_some_and(|f| filter.features_of_interest.contains(f))
        {
            return false;
        }
        if let Some(bbox) = &filter.bbox {
            let inside = observation
                .feature_of_interest
                .as_deref()
                .and_then(|f| self.feature(f))
                .and_then(|f| f.geometry.as_ref())
                .is_some_and(|g| bbox.contains_point(g.x, g.y));
            if !inside {
                return false;
            }
        }
        true
    }

    fn ensure_property(&mut self, id: &str) {
        let known = self.properties.iter().any(|p| p.covers(id));
        if !known {
            self.properties.push(ObservedProperty::new(id));
        }
    }

    fn ensure_feature(&mut self, id: &str) {
        if self.feature(id).is_none() {
            self.features.push(FeatureOfInterest {
                id: id.to_string(),
                name: None,
                geometry: None,
            });
        }
    }

    /// Add what an observation references to an offering.
    fn attach(&mut self, offering_id: &str, observation: &Observation) {
        if let Some(offering) = self.offerings.iter_mut().find(|o| o.id == offering_id) {
            push_unique(&mut offering.procedures, &observation.procedure);
            push_unique(&mut offering.observed_properties, &observation.observed_property);
            if let Some(feature) = &observation.feature_of_interest {
                push_unique(&mut offering.features_of_interest, feature);
            }
        }
        self.ensure_property(&observation.observed_property);
        if let Some(feature) = observation.feature_of_interest.clone() {
            self.ensure_feature(&feature);
        }
    }

    fn assign_id(&mut self, id_base: &str) -> String {
        let id = format!("{}{}", id_base, self.next_id);
        self.next_id += 1;
        id
    }

    /// Recompute the temporal and spatial envelopes of every offering.
    fn refresh_envelopes(&mut self) {
        for i in 0..self.offerings.len() {
            let offering = &self.offerings[i];
            let times = self
                .observations
                .iter()
                .filter(|o| offering.has_procedure(&o.procedure))
                .flat_map(|o| [o.sampling_time.begin(), o.sampling_time.end()])
                .flatten();
            let time = times.fold(None, |acc: Option<(_, _)>, t| match acc {
                None => Some((t, t)),
                Some((min, max)) => Some((t.min(min), t.max(max))),
            });
            let bbox = BoundingBox::envelope(
                offering
                    .features_of_interest
                    .iter()
                    .filter_map(|f| self.feature(f))
                    .filter_map(|f| f.geometry.as_ref())
                    .map(|g| (g.x, g.y)),
            );

            let offering = &mut self.offerings[i];
            offering.time = time.map(|(begin, end)| TimePeriod::bounded(begin, end));
            offering.bbox = bbox;
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Highest numeric suffix following `base` among `ids`, plus one.
pub(crate) fn next_suffix<'a>(base: &str, ids: impl Iterator<Item = &'a str>) -> u64 {
    ids.filter_map(|id| id.strip_prefix(base))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .map_or(0, |n| n + 1)
}

/// Observation store kept entirely in memory.
pub struct MemoryObservationStore {
    catalog: RwLock<Catalog>,
    id_base: String,
}

impl MemoryObservationStore {
    pub fn new(id_base: impl Into<String>) -> Self {
        Self::build(CatalogFile::default(), Vec::new(), id_base.into())
    }

    pub fn from_catalog(catalog: CatalogFile, id_base: impl Into<String>) -> StoreResult<Self> {
        let observations = catalog.decode_observations()?;
        Ok(Self::build(catalog, observations, id_base.into()))
    }

    fn build(catalog: CatalogFile, mut observations: Vec<Observation>, id_base: String) -> Self {
        let next_id = next_suffix(
            &id_base,
            observations.iter().filter_map(|o| o.id.as_deref()),
        );
        let mut catalog = Catalog {
            offerings: catalog.offerings,
            properties: catalog.observed_properties,
            features: catalog.features,
            observations: Vec::new(),
            next_id,
        };
        for observation in observations.iter_mut() {
            if observation.id.is_none() {
                observation.id = Some(catalog.assign_id(&id_base));
            }
        }
        catalog.observations = observations;
        catalog.refresh_envelopes();

        Self {
            catalog: RwLock::new(catalog),
            id_base,
        }
    }
}

#[async_trait]
impl ObservationStore for MemoryObservationStore {
    async fn offerings(&self) -> StoreResult<Vec<Offering>> {
        Ok(self.catalog.read().await.offerings.clone())
    }

    async fn offering(&self, id: &str) -> StoreResult<Option<Offering>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.offerings.iter().find(|o| o.id == id).cloned())
    }

    async fn observed_properties(&self) -> StoreResult<Vec<ObservedProperty>> {
        Ok(self.catalog.read().await.properties.clone())
    }

    async fn features(&self) -> StoreResult<Vec<FeatureOfInterest>> {
        Ok(self.catalog.read().await.features.clone())
    }

    async fn query(&self, filter: &ObservationFilter) -> StoreResult<Vec<Observation>> {
        let catalog = self.catalog.read().await;
        let found: Vec<Observation> = catalog
            .observations
            .iter()
            .filter(|o| catalog.matches(filter, o))
            .cloned()
            .collect();
        debug!(matched = found.len(), "Observation query");
        Ok(found)
    }

    async fn observation(&self, id: &str) -> StoreResult<Option<Observation>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .observations
            .iter()
            .find(|o| o.id.as_deref() == Some(id))
            .cloned())
    }

    async fn insert_observations(
        &self,
        offerings: &[String],
        observations: Vec<Observation>,
    ) -> StoreResult<Vec<String>> {
        let mut catalog = self.catalog.write().await;
        let mut ids = Vec::with_capacity(observations.len());

        for mut observation in observations {
            let targets: Vec<String> = if offerings.is_empty() {
                catalog
                    .offerings
                    .iter()
                    .filter(|o| o.has_procedure(&observation.procedure))
                    .map(|o| o.id.clone())
                    .collect()
            } else {
                offerings.to_vec()
            };
            for target in &targets {
                catalog.attach(target, &observation);
            }

            let id = catalog.assign_id(&self.id_base);
            observation.id = Some(id.clone());
            catalog.observations.push(observation);
            ids.push(id);
        }

        catalog.refresh_envelopes();
        debug!(inserted = ids.len(), "Inserted observations");
        Ok(ids)
    }

    async fn create_offering(&self, offering: Offering) -> StoreResult<()> {
        let mut catalog = self.catalog.write().await;
        for property in &offering.observed_properties {
            catalog.ensure_property(property);
        }
        for feature in &offering.features_of_interest {
            catalog.ensure_feature(feature);
        }

        match catalog.offerings.iter_mut().find(|o| o.id == offering.id) {
            Some(existing) => {
                for p in &offering.procedures {
                    push_unique(&mut existing.procedures, p);
                }
                for p in &offering.observed_properties {
                    push_unique(&mut existing.observed_properties, p);
                }
                for f in &offering.features_of_interest {
                    push_unique(&mut existing.features_of_interest, f);
                }
            }
            None => catalog.offerings.push(offering),
        }
        catalog.refresh_envelopes();
        Ok(())
    }
}

/// Sensor description store kept entirely in memory.
#[derive(Default)]
pub struct MemorySensorStore {
    descriptions: RwLock<Vec<(String, SensorDescription)>>,
}

impl MemorySensorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: &CatalogFile) -> Self {
        let descriptions = catalog
            .sensors
            .iter()
            .map(|s| {
                (
                    s.procedure.clone(),
                    SensorDescription {
                        procedure: Some(s.procedure.clone()),
                        format: s.format.clone(),
                        content: s.content.clone(),
                    },
                )
            })
            .collect();
        Self {
            descriptions: RwLock::new(descriptions),
        }
    }
}

#[async_trait]
impl SensorDescriptionStore for MemorySensorStore {
    async fn procedures(&self) -> StoreResult<Vec<String>> {
        let descriptions = self.descriptions.read().await;
        Ok(descriptions.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn get(&self, procedure: &str) -> StoreResult<Option<SensorDescription>> {
        let descriptions = self.descriptions.read().await;
        Ok(descriptions
            .iter()
            .find(|(id, _)| id == procedure)
            .map(|(_, d)| d.clone()))
    }

    async fn put(&self, procedure: &str, description: SensorDescription) -> StoreResult<()> {
        let mut descriptions = self.descriptions.write().await;
        match descriptions.iter_mut().find(|(id, _)| id == procedure) {
            Some((_, existing)) => *existing = description,
            None => descriptions.push((procedure.to_string(), description)),
        }
        Ok(())
    }

    async fn remove(&self, procedure: &str) -> StoreResult<bool> {
        let mut descriptions = self.descriptions.write().await;
        let before = descriptions.len();
        descriptions.retain(|(id, _)| id != procedure);
        Ok(descriptions.len() != before)
    }
}
