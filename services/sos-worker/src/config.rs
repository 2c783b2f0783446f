//! Service configuration loading and types.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use sos_protocol::responses::{ServiceIdentification, ServiceProvider};

/// Reasons a worker cannot be brought up.
///
/// The messages are reported verbatim to clients of a stopped worker.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("The configuration object is malformed or null.")]
    Malformed,

    #[error("The configuration file can't be found.")]
    NotFound,

    #[error("The configuration file does not contains a SML configuration.")]
    MissingSml,

    #[error("The configuration file does not contains a O&M configuration.")]
    MissingOm,

    #[error("Unable to find a SOS Factory.{0}")]
    Factory(String),
}

/// Which operation set the worker exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Read-only operations.
    Discovery,
    /// Read operations plus RegisterSensor, DeleteSensor and the inserts.
    #[default]
    Transactional,
}

/// Connection settings of one backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    /// Catalog file seeding the store. Relative paths are resolved against
    /// the directory of the configuration file.
    #[serde(default)]
    pub data_file: Option<PathBuf>,
}

/// Worker configuration loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Name of the SOS factory building the stores.
    #[serde(default = "default_factory")]
    pub factory: String,

    #[serde(default)]
    pub profile: Profile,

    /// Sensor description store.
    #[serde(default)]
    pub sml: Option<StoreSection>,

    /// Observation store.
    #[serde(default)]
    pub om: Option<StoreSection>,

    /// Prefix of generated procedure identifiers.
    #[serde(default = "default_sensor_id_base")]
    pub sensor_id_base: String,

    /// Prefix of generated observation identifiers.
    #[serde(default = "default_observation_id_base")]
    pub observation_id_base: String,

    /// Start of the window of templates created without a temporal filter.
    #[serde(default = "default_sentinel_start")]
    pub template_sentinel_start: DateTime<Utc>,

    /// CRS identifiers accepted as `srsName`.
    #[serde(default = "default_supported_srs")]
    pub supported_srs: Vec<String>,

    #[serde(default)]
    pub update_sequence: Option<String>,

    #[serde(default)]
    pub service_identification: ServiceIdentification,

    #[serde(default)]
    pub service_provider: ServiceProvider,
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        Self {
            factory: default_factory(),
            profile: Profile::default(),
            sml: Some(StoreSection::default()),
            om: Some(StoreSection::default()),
            sensor_id_base: default_sensor_id_base(),
            observation_id_base: default_observation_id_base(),
            template_sentinel_start: default_sentinel_start(),
            supported_srs: default_supported_srs(),
            update_sequence: None,
            service_identification: ServiceIdentification::default(),
            service_provider: ServiceProvider::default(),
        }
    }
}

impl ServiceConfiguration {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "Configuration file not found");
            return Err(ConfigError::NotFound);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read configuration");
            ConfigError::NotFound
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_yaml(&content, base_dir)?;

        tracing::info!(
            path = %path.display(),
            factory = %config.factory,
            profile = ?config.profile,
            "Loaded service configuration"
        );
        Ok(config)
    }

    /// Parse and validate YAML, resolving relative paths against `base_dir`.
    pub fn from_yaml(content: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse configuration");
            ConfigError::Malformed
        })?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    /// Check that both store sections are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sml.is_none() {
            return Err(ConfigError::MissingSml);
        }
        if self.om.is_none() {
            return Err(ConfigError::MissingOm);
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        for section in [self.sml.as_mut(), self.om.as_mut()].into_iter().flatten() {
            if let Some(file) = section.data_file.as_mut() {
                if file.is_relative() {
                    *file = base_dir.join(&*file);
                }
            }
        }
    }

    pub fn is_transactional(&self) -> bool {
        self.profile == Profile::Transactional
    }

    pub fn supports_srs(&self, srs: &str) -> bool {
        self.supported_srs.iter().any(|s| s == srs.trim())
    }
}

fn default_factory() -> String {
    "memory".to_string()
}

fn default_sensor_id_base() -> String {
    "urn:ogc:object:sensor:GEOM:".to_string()
}

fn default_observation_id_base() -> String {
    "urn:ogc:object:observation:GEOM:".to_string()
}

fn default_sentinel_start() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

fn default_supported_srs() -> Vec<String> {
    vec![
        "urn:ogc:def:crs:EPSG::4326".to_string(),
        "EPSG:4326".to_string(),
    ]
}
