//! Internal response representation.
//!
//! Capabilities sections are `Option`s: a section that was not requested is
//! absent from the document, not present-but-empty.

use serde::{Deserialize, Serialize};

use sos_common::{BoundingBox, TimePeriod};

use crate::types::{Observation, ObservationTemplate, ResultStructure, SensorDescription, TextEncoding};

/// Result of a successful operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "body")]
pub enum SosResponse {
    Capabilities(Box<Capabilities>),
    SensorDescription(SensorDescription),
    Observations(ObservationCollection),
    Templates(Vec<ObservationTemplate>),
    ResultTemplate(ResultTemplateResponse),
    ResultValues(ResultValuesResponse),
    InsertObservation(InsertObservationResponse),
    InsertResultTemplate(InsertResultTemplateResponse),
    InsertResult(InsertResultResponse),
    RegisterSensor(RegisterSensorResponse),
    DeleteSensor(DeleteSensorResponse),
}

/// Observations returned by GetObservation and GetObservationById.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationCollection {
    pub response_format: String,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTemplateResponse {
    pub template_id: String,
    pub result_structure: ResultStructure,
    pub result_encoding: TextEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultValuesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub values: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertObservationResponse {
    pub observation_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertResultTemplateResponse {
    pub template_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertResultResponse {
    pub inserted_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterSensorResponse {
    pub procedure: String,
    /// Only assigned in the observation-template profile.
    pub offering: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteSensorResponse {
    pub procedure: String,
}

/// Sectioned capabilities document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capabilities {
    pub version: String,
    /// Format negotiated from `acceptFormats`.
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_sequence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_identification: Option<ServiceIdentification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_provider: Option<ServiceProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations_metadata: Option<OperationsMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Contents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_capabilities: Option<FilterCapabilities>,
}

/// ServiceIdentification section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceIdentification {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub service_type_versions: Vec<String>,
    #[serde(default = "default_fees")]
    pub fees: String,
    #[serde(default = "default_fees")]
    pub access_constraints: String,
}

impl Default for ServiceIdentification {
    fn default() -> Self {
        Self {
            title: default_title(),
            abstract_: String::new(),
            keywords: Vec::new(),
            service_type: String::new(),
            service_type_versions: Vec::new(),
            fees: default_fees(),
            access_constraints: default_fees(),
        }
    }
}

fn default_title() -> String {
    "Sensor Observation Service".to_string()
}

fn default_fees() -> String {
    "NONE".to_string()
}

/// ServiceProvider section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProvider {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// OperationsMetadata section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationsMetadata {
    pub operations: Vec<OperationMetadata>,
}

impl OperationsMetadata {
    pub fn operation(&self, name: &str) -> Option<&OperationMetadata> {
        self.operations.iter().find(|op| op.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationMetadata {
    pub name: String,
    pub parameters: Vec<ParameterDomain>,
}

impl OperationMetadata {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDomain> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Allowed values of one operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDomain {
    pub name: String,
    pub allowed_values: Vec<String>,
}

/// Contents section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contents {
    pub offerings: Vec<OfferingSummary>,
}

/// One observation offering as advertised in the contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferingSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features_of_interest: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimePeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub response_formats: Vec<String>,
    pub result_models: Vec<String>,
    pub response_modes: Vec<String>,
}

/// FilterCapabilities section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCapabilities {
    pub temporal_operators: Vec<String>,
    pub temporal_operands: Vec<String>,
    pub spatial_operators: Vec<String>,
}

impl Default for FilterCapabilities {
    fn default() -> Self {
        Self {
            temporal_operators: ["TM_Before", "TM_After", "TM_During", "TM_Equals"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            temporal_operands: vec!["TimeInstant".to_string(), "TimePeriod".to_string()],
            spatial_operators: vec!["BBOX".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_sections_not_serialized() {
        let caps = Capabilities {
            version: "2.0.0".to_string(),
            format: "text/xml".to_string(),
            update_sequence: None,
            service_identification: Some(ServiceIdentification::default()),
            service_provider: None,
            operations_metadata: None,
            contents: None,
            filter_capabilities: None,
        };
        let json = serde_json::to_value(&caps).unwrap();
        assert!(json.get("service_identification").is_some());
        assert!(json.get("contents").is_none());
        assert!(json.get("service_provider").is_none());
    }

    #[test]
    fn test_response_tagging() {
        let response = SosResponse::DeleteSensor(DeleteSensorResponse {
            procedure: "urn:ogc:object:sensor:GEOM:1".to_string(),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "DeleteSensor");
        assert_eq!(json["body"]["procedure"], "urn:ogc:object:sensor:GEOM:1");
    }

    #[test]
    fn test_register_response_keeps_null_offering() {
        let response = RegisterSensorResponse {
            procedure: "urn:ogc:object:sensor:GEOM:12".to_string(),
            offering: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["offering"].is_null());
    }
}
