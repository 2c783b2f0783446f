//! OGC Sensor Observation Service protocol model.
//!
//! This crate holds everything about the SOS protocol that does not need a
//! store: the data model, the temporal filter evaluator, the result value
//! codec, the internal request/response representation, capabilities
//! construction with version negotiation, and the KVP adapters.
//!
//! # Example
//!
//! ```rust
//! use sos_protocol::filter::TemporalFilter;
//! use chrono::{TimeZone, Utc};
//!
//! let cutoff = Utc.with_ymd_and_hms(2007, 5, 1, 5, 0, 0).unwrap();
//! let row = Utc.with_ymd_and_hms(2007, 5, 1, 4, 59, 0).unwrap();
//! assert!(TemporalFilter::Before(cutoff).matches_instant(&row));
//! ```

pub mod capabilities;
pub mod codec;
pub mod filter;
pub mod kvp;
pub mod requests;
pub mod responses;
pub mod types;

// Re-export commonly used types
pub use capabilities::{negotiate_format, negotiate_version, CapabilitiesBuilder, CatalogSnapshot, Section};
pub use codec::CodecError;
pub use filter::TemporalFilter;
pub use requests::{Operation, RequestBody, ServiceRequest};
pub use responses::{Capabilities, SosResponse};
pub use types::{
    FeatureOfInterest, Field, FieldKind, Observation, ObservationTemplate, ObservedProperty,
    Offering, Procedure, ProcedureState, ResponseMode, ResultBlock, ResultModel, ResultRow,
    ResultStructure, ScalarValue, SensorDescription, TextEncoding, Version,
};

/// Service type name carried by every request.
pub const SERVICE: &str = "SOS";

/// Prefix of observation template identifiers: `template:{procedure}-{n}`.
pub const TEMPLATE_ID_PREFIX: &str = "template:";

/// Namespace URIs.
pub mod namespaces {
    /// O&M 1.0 namespace, used to qualify result models.
    pub const OM_1_0: &str = "http://www.opengis.net/om/1.0";
}

/// Media types and format identifiers.
pub mod formats {
    use crate::types::Version;

    /// Capabilities document formats.
    pub const ACCEPT_FORMATS: &[&str] = &["text/xml", "application/xml"];

    /// O&M 1.0 observation collection.
    pub const OM_1_0_0: &str = "text/xml; subtype=\"om/1.0.0\"";
    /// O&M 2.0 observation.
    pub const OM_2_0: &str = "http://www.opengis.net/om/2.0";

    pub const SENSORML_1_0_0_MIME: &str = "text/xml;subtype=\"sensorML/1.0.0\"";
    pub const SENSORML_1_0_0: &str = "http://www.opengis.net/sensorML/1.0.0";
    pub const SENSORML_1_0_1: &str = "http://www.opengis.net/sensorML/1.0.1";

    /// Procedure description formats accepted by DescribeSensor and RegisterSensor.
    pub const SENSOR_FORMATS: &[&str] = &[SENSORML_1_0_0_MIME, SENSORML_1_0_0, SENSORML_1_0_1];

    /// Observation response formats per version.
    pub fn response_formats(version: Version) -> &'static [&'static str] {
        match version {
            Version::V1_0_0 => &[OM_1_0_0],
            Version::V2_0_0 => &[OM_2_0],
        }
    }

    /// Default observation response format of a version.
    pub fn default_response_format(version: Version) -> &'static str {
        response_formats(version)[0]
    }

    pub fn is_sensor_format(format: &str) -> bool {
        SENSOR_FORMATS.contains(&format.trim())
    }
}

/// Canonical request parameter names reported as exception locators.
pub mod locators {
    pub const SERVICE: &str = "service";
    pub const VERSION: &str = "version";
    pub const REQUEST: &str = "request";
    pub const ACCEPT_VERSION: &str = "acceptVersion";
    pub const ACCEPT_FORMATS: &str = "acceptFormats";
    pub const SECTIONS: &str = "sections";
    pub const OFFERING: &str = "offering";
    pub const PROCEDURE: &str = "procedure";
    pub const OBSERVED_PROPERTY: &str = "observedProperty";
    pub const FEATURE_OF_INTEREST: &str = "featureOfInterest";
    pub const RESPONSE_FORMAT: &str = "responseFormat";
    pub const RESPONSE_MODE: &str = "responseMode";
    pub const RESULT_MODEL: &str = "resultModel";
    pub const SRS_NAME: &str = "srsName";
    pub const OBSERVATION: &str = "observation";
    pub const OBSERVATION_TEMPLATE_ID: &str = "ObservationTemplateId";
    pub const TEMPLATE: &str = "template";
    pub const PROPOSED_TEMPLATE: &str = "observationTemplate";
    pub const RESULT_VALUES: &str = "resultValues";
    pub const RESULT_STRUCTURE: &str = "resultStructure";
    pub const RESULT_ENCODING: &str = "resultEncoding";
    pub const PROCEDURE_DESCRIPTION: &str = "procedureDescription";
    pub const PROCEDURE_DESCRIPTION_FORMAT: &str = "PROCEDURE_DESCRIPTION_FORMAT";
    pub const OBSERVATION_TEMPLATE: &str = "OBSERVATION_TEMPLATE";
    pub const OUTPUT_FORMAT: &str = "outputFormat";
    pub const DESCRIPTION_FORMAT: &str = "procedureDescriptionFormat";
    pub const TEMPORAL_FILTER: &str = "temporalFilter";
    pub const EVENT_TIME: &str = "eventTime";
    pub const SPATIAL_FILTER: &str = "spatialFilter";
}
