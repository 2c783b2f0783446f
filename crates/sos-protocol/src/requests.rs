//! Internal request representation.
//!
//! Every wire request, whatever its version or encoding, is translated into
//! a [`ServiceRequest`] before it reaches the worker. Fields mirror the
//! request parameters; absent optional parameters stay `None` or empty.

use serde::{Deserialize, Serialize};

use sos_common::BoundingBox;

use crate::filter::TemporalFilter;
use crate::types::{Observation, ResultStructure, SensorDescription, TextEncoding, Version};

/// The logical SOS operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    GetCapabilities,
    DescribeSensor,
    GetObservation,
    GetObservationById,
    GetResult,
    GetResultTemplate,
    InsertObservation,
    InsertResultTemplate,
    InsertResult,
    RegisterSensor,
    DeleteSensor,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::GetCapabilities,
        Operation::DescribeSensor,
        Operation::GetObservation,
        Operation::GetObservationById,
        Operation::GetResult,
        Operation::GetResultTemplate,
        Operation::InsertObservation,
        Operation::InsertResultTemplate,
        Operation::InsertResult,
        Operation::RegisterSensor,
        Operation::DeleteSensor,
    ];

    /// Canonical, version independent name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetCapabilities => "GetCapabilities",
            Operation::DescribeSensor => "DescribeSensor",
            Operation::GetObservation => "GetObservation",
            Operation::GetObservationById => "GetObservationById",
            Operation::GetResult => "GetResult",
            Operation::GetResultTemplate => "GetResultTemplate",
            Operation::InsertObservation => "InsertObservation",
            Operation::InsertResultTemplate => "InsertResultTemplate",
            Operation::InsertResult => "InsertResult",
            Operation::RegisterSensor => "RegisterSensor",
            Operation::DeleteSensor => "DeleteSensor",
        }
    }

    /// Name used on the wire by a protocol version.
    pub fn wire_name(&self, version: Version) -> &'static str {
        match (self, version) {
            (Operation::RegisterSensor, Version::V2_0_0) => "InsertSensor",
            _ => self.as_str(),
        }
    }

    /// Parse a wire name of any version, ignoring case.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("InsertSensor") {
            return Some(Operation::RegisterSensor);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
    }

    /// Operations that modify the catalog.
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            Operation::InsertObservation
                | Operation::InsertResultTemplate
                | Operation::InsertResult
                | Operation::RegisterSensor
                | Operation::DeleteSensor
        )
    }
}

/// A request addressed to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub service: Option<String>,
    /// Protocol version. For GetCapabilities this is the single-version form.
    pub version: Option<String>,
    pub body: RequestBody,
}

impl ServiceRequest {
    /// A well-formed request header for the given version.
    pub fn new(version: Version, body: impl Into<RequestBody>) -> Self {
        Self {
            service: Some(crate::SERVICE.to_string()),
            version: Some(version.as_str().to_string()),
            body: body.into(),
        }
    }

    /// GetCapabilities carries no version header of its own.
    pub fn capabilities(body: GetCapabilities) -> Self {
        Self {
            service: Some(crate::SERVICE.to_string()),
            version: None,
            body: RequestBody::GetCapabilities(body),
        }
    }

    pub fn operation(&self) -> Operation {
        self.body.operation()
    }
}

/// Operation-specific request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestBody {
    GetCapabilities(GetCapabilities),
    DescribeSensor(DescribeSensor),
    GetObservation(GetObservation),
    GetObservationById(GetObservationById),
    GetResult(GetResult),
    GetResultTemplate(GetResultTemplate),
    InsertObservation(InsertObservation),
    InsertResultTemplate(InsertResultTemplate),
    InsertResult(InsertResult),
    RegisterSensor(RegisterSensor),
    DeleteSensor(DeleteSensor),
}

impl RequestBody {
    pub fn operation(&self) -> Operation {
        match self {
            RequestBody::GetCapabilities(_) => Operation::GetCapabilities,
            RequestBody::DescribeSensor(_) => Operation::DescribeSensor,
            RequestBody::GetObservation(_) => Operation::GetObservation,
            RequestBody::GetObservationById(_) => Operation::GetObservationById,
            RequestBody::GetResult(_) => Operation::GetResult,
            RequestBody::GetResultTemplate(_) => Operation::GetResultTemplate,
            RequestBody::InsertObservation(_) => Operation::InsertObservation,
            RequestBody::InsertResultTemplate(_) => Operation::InsertResultTemplate,
            RequestBody::InsertResult(_) => Operation::InsertResult,
            RequestBody::RegisterSensor(_) => Operation::RegisterSensor,
            RequestBody::DeleteSensor(_) => Operation::DeleteSensor,
        }
    }
}

macro_rules! into_body {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for RequestBody {
                fn from(body: $variant) -> Self {
                    RequestBody::$variant(body)
                }
            }
        )+
    };
}

into_body!(
    GetCapabilities,
    DescribeSensor,
    GetObservation,
    GetObservationById,
    GetResult,
    GetResultTemplate,
    InsertObservation,
    InsertResultTemplate,
    InsertResult,
    RegisterSensor,
    DeleteSensor,
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetCapabilities {
    pub accept_versions: Vec<String>,
    pub sections: Vec<String>,
    pub accept_formats: Vec<String>,
    pub update_sequence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeSensor {
    pub procedure: Option<String>,
    /// `outputFormat` in 1.0.0, `procedureDescriptionFormat` in 2.0.0.
    pub output_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetObservation {
    pub offerings: Vec<String>,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features_of_interest: Vec<String>,
    pub temporal_filters: Vec<TemporalFilter>,
    /// Bounding box on the features of interest, evaluated by the store.
    pub spatial_filter: Option<BoundingBox>,
    pub response_format: Option<String>,
    pub result_model: Option<String>,
    pub response_mode: Option<String>,
    pub srs_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetObservationById {
    pub observation_ids: Vec<String>,
    pub response_format: Option<String>,
    pub result_model: Option<String>,
    pub response_mode: Option<String>,
    pub srs_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResult {
    pub template_id: Option<String>,
    pub offering: Option<String>,
    pub observed_property: Option<String>,
    pub features_of_interest: Vec<String>,
    pub temporal_filters: Vec<TemporalFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResultTemplate {
    pub offering: Option<String>,
    pub observed_property: Option<String>,
    /// Defaults to the first registered procedure of the offering.
    pub procedure: Option<String>,
    pub feature_of_interest: Option<String>,
    pub temporal_filters: Vec<TemporalFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertObservation {
    pub offerings: Vec<String>,
    pub observations: Vec<Observation>,
}

/// The observation skeleton proposed for a template or a new sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateProposal {
    pub procedure: Option<String>,
    pub observed_property: Option<String>,
    pub feature_of_interest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertResultTemplate {
    pub offering: Option<String>,
    pub proposed_template: Option<TemplateProposal>,
    pub result_structure: Option<ResultStructure>,
    pub result_encoding: Option<TextEncoding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertResult {
    pub template_id: Option<String>,
    pub result_values: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterSensor {
    pub description: Option<SensorDescription>,
    pub procedure_description_format: Option<String>,
    /// Observation template of the 1.0.0 profile.
    pub observation_template: Option<TemplateProposal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteSensor {
    pub procedure: Option<String>,
}
