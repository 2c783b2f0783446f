//! Backing store abstractions.
//!
//! The worker owns protocol semantics only. Catalog contents, observations
//! and sensor descriptions live behind these traits.

use async_trait::async_trait;
use thiserror::Error;

use sos_common::{BoundingBox, SosError};
use sos_protocol::{FeatureOfInterest, Observation, ObservedProperty, Offering, SensorDescription};

/// Errors raised by store implementations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(String),

    #[error("Invalid store content: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(err: serde_yaml::Error) -> Self {
        StoreError::Parse(err.to_string())
    }
}

impl From<StoreError> for SosError {
    fn from(err: StoreError) -> Self {
        SosError::no_applicable_code(None, err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Identity and spatial criteria of an observation query.
///
/// Each non-empty list restricts the result to observations matching one
/// of its entries. Temporal criteria are applied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationFilter {
    pub offerings: Vec<String>,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features_of_interest: Vec<String>,
    /// Features of interest must lie inside this box.
    pub bbox: Option<BoundingBox>,
}

/// Catalog and observation storage.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// All offerings, with their envelopes up to date.
    async fn offerings(&self) -> StoreResult<Vec<Offering>>;

    async fn offering(&self, id: &str) -> StoreResult<Option<Offering>>;

    /// Known phenomena, composites included.
    async fn observed_properties(&self) -> StoreResult<Vec<ObservedProperty>>;

    async fn features(&self) -> StoreResult<Vec<FeatureOfInterest>>;

    /// Observations matching the filter, in insertion order.
    async fn query(&self, filter: &ObservationFilter) -> StoreResult<Vec<Observation>>;

    async fn observation(&self, id: &str) -> StoreResult<Option<Observation>>;

    /// Persist observations and return their assigned identifiers.
    ///
    /// Each observation is attached to the given offerings, or to the
    /// offerings already advertising its procedure when none are given.
    async fn insert_observations(
        &self,
        offerings: &[String],
        observations: Vec<Observation>,
    ) -> StoreResult<Vec<String>>;

    /// Create an offering, or merge into an existing one with the same id.
    async fn create_offering(&self, offering: Offering) -> StoreResult<()>;
}

/// Procedure description storage.
#[async_trait]
pub trait SensorDescriptionStore: Send + Sync {
    /// Identifiers of every stored description.
    async fn procedures(&self) -> StoreResult<Vec<String>>;

    async fn get(&self, procedure: &str) -> StoreResult<Option<SensorDescription>>;

    async fn put(&self, procedure: &str, description: SensorDescription) -> StoreResult<()>;

    /// Returns whether a description was removed.
    async fn remove(&self, procedure: &str) -> StoreResult<bool>;
}
