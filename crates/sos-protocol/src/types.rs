//! Core SOS data model.
//!
//! Offerings, procedures, phenomena, features of interest, observations and
//! their result blocks, plus the small enumerations negotiated per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use sos_common::{BoundingBox, SamplingTime, TimePeriod};

use crate::filter::TemporalFilter;
use crate::namespaces;

/// Protocol versions understood by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Version {
    #[serde(rename = "1.0.0")]
    V1_0_0,
    #[serde(rename = "2.0.0")]
    V2_0_0,
}

impl Version {
    /// All versions, oldest first.
    pub const ALL: [Version; 2] = [Version::V1_0_0, Version::V2_0_0];

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V1_0_0 => "1.0.0",
            Version::V2_0_0 => "2.0.0",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "1.0.0" => Some(Version::V1_0_0),
            "2.0.0" => Some(Version::V2_0_0),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How GetObservation delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResponseMode {
    #[default]
    Inline,
    ResultTemplate,
    OutOfBand,
    Attached,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Inline => "inline",
            ResponseMode::ResultTemplate => "resultTemplate",
            ResponseMode::OutOfBand => "out-of-band",
            ResponseMode::Attached => "attached",
        }
    }

    /// Accepts both the OGC spelling and the enumeration name, any case.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "inline" => Some(ResponseMode::Inline),
            "resulttemplate" => Some(ResponseMode::ResultTemplate),
            "outofband" => Some(ResponseMode::OutOfBand),
            "attached" => Some(ResponseMode::Attached),
            _ => None,
        }
    }
}

/// Requested O&M result model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultModel {
    Observation,
    Measurement,
}

impl ResultModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultModel::Observation => "om:Observation",
            ResultModel::Measurement => "om:Measurement",
        }
    }

    /// Parse a QName in prefixed (`om:Measurement`) or expanded
    /// (`{http://www.opengis.net/om/1.0}Measurement`) form.
    pub fn parse(qname: &str) -> Option<Self> {
        let qname = qname.trim();
        let local = if let Some(rest) = qname.strip_prefix('{') {
            let (namespace, local) = rest.split_once('}')?;
            if namespace != namespaces::OM_1_0 {
                return None;
            }
            local
        } else {
            qname.strip_prefix("om:")?
        };
        match local {
            "Observation" => Some(ResultModel::Observation),
            "Measurement" => Some(ResultModel::Measurement),
            _ => None,
        }
    }
}

/// Lifecycle state of a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcedureState {
    Registered,
    Deleted,
}

/// A sensor or process producing observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub state: ProcedureState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<String>,
}

impl Procedure {
    pub fn registered(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: ProcedureState::Registered,
            offering: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state == ProcedureState::Registered
    }
}

/// A named grouping of procedures and phenomena exposed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub procedures: Vec<String>,
    #[serde(default)]
    pub observed_properties: Vec<String>,
    #[serde(default)]
    pub features_of_interest: Vec<String>,
    /// Temporal envelope, derived from the stored observations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimePeriod>,
    /// Spatial envelope, derived from the features of interest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Offering {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            procedures: Vec::new(),
            observed_properties: Vec::new(),
            features_of_interest: Vec::new(),
            time: None,
            bbox: None,
        }
    }

    pub fn has_procedure(&self, procedure: &str) -> bool {
        self.procedures.iter().any(|p| p == procedure)
    }
}

/// A phenomenon, possibly a composite of other phenomena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedProperty {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
}

impl ObservedProperty {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            components: Vec::new(),
        }
    }

    pub fn is_composite(&self) -> bool {
        !self.components.is_empty()
    }

    /// True if `property` is this phenomenon or one of its components.
    pub fn covers(&self, property: &str) -> bool {
        self.id == property || self.components.iter().any(|c| c == property)
    }
}

/// A point geometry. Anything richer is the store's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
}

/// The real-world entity being sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureOfInterest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Point>,
}

/// Kind of a result field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Time,
    Quantity {
        #[serde(default)]
        uom: String,
    },
    Text,
    Boolean,
}

/// One column of a result block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub definition: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn time() -> Self {
        Self {
            name: "Time".to_string(),
            definition: "http://www.opengis.net/def/property/OGC/0/SamplingTime".to_string(),
            kind: FieldKind::Time,
        }
    }

    pub fn quantity(definition: impl Into<String>, uom: impl Into<String>) -> Self {
        let definition = definition.into();
        let name = definition
            .rsplit(':')
            .next()
            .unwrap_or(definition.as_str())
            .to_string();
        Self {
            name,
            definition,
            kind: FieldKind::Quantity { uom: uom.into() },
        }
    }
}

/// Ordered description of the columns of a result block.
///
/// The first field is always the sampling time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultStructure {
    pub fields: Vec<Field>,
}

impl ResultStructure {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Time field followed by one unitless quantity per observed property.
    pub fn for_properties<S: AsRef<str>>(properties: &[S]) -> Self {
        let mut fields = vec![Field::time()];
        fields.extend(properties.iter().map(|p| Field::quantity(p.as_ref(), "")));
        Self { fields }
    }

    /// Non-empty, time first, no other time column.
    pub fn is_valid(&self) -> bool {
        match self.fields.split_first() {
            Some((first, rest)) => {
                first.kind == FieldKind::Time && rest.iter().all(|f| f.kind != FieldKind::Time)
            }
            None => false,
        }
    }

    /// Number of measurement values carried by each row.
    pub fn value_count(&self) -> usize {
        self.fields.len().saturating_sub(1)
    }
}

/// Separators used by the text result encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextEncoding {
    pub token_separator: String,
    pub block_separator: String,
    pub decimal_separator: String,
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self {
            token_separator: ",".to_string(),
            block_separator: "@@".to_string(),
            decimal_separator: ".".to_string(),
        }
    }
}

impl TextEncoding {
    /// Every separator is non-empty and none contains another.
    pub fn is_valid(&self) -> bool {
        let separators = [
            &self.token_separator,
            &self.block_separator,
            &self.decimal_separator,
        ];
        separators.iter().all(|s| !s.is_empty())
            && separators.iter().enumerate().all(|(i, a)| {
                separators
                    .iter()
                    .enumerate()
                    .all(|(j, b)| i == j || !a.contains(b.as_str()))
            })
    }
}

/// A single measurement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Quantity(f64),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Quantity(v) => write!(f, "{}", v),
            ScalarValue::Boolean(b) => write!(f, "{}", b),
            ScalarValue::Text(s) => f.write_str(s),
        }
    }
}

/// One row of a result block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub time: DateTime<Utc>,
    pub values: Vec<ScalarValue>,
}

impl ResultRow {
    pub fn new(time: DateTime<Utc>, values: Vec<ScalarValue>) -> Self {
        Self { time, values }
    }

    /// Row with a single quantity, the common case for scalar sensors.
    pub fn quantity(time: DateTime<Utc>, value: f64) -> Self {
        Self::new(time, vec![ScalarValue::Quantity(value)])
    }
}

/// Literal tabular payload of an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBlock {
    pub structure: ResultStructure,
    #[serde(default)]
    pub encoding: TextEncoding,
    pub element_count: usize,
    #[serde(default)]
    pub rows: Vec<ResultRow>,
}

impl ResultBlock {
    pub fn new(structure: ResultStructure, encoding: TextEncoding, rows: Vec<ResultRow>) -> Self {
        Self {
            structure,
            encoding,
            element_count: rows.len(),
            rows,
        }
    }

    /// Structure-only block, as carried by templates.
    pub fn empty(structure: ResultStructure, encoding: TextEncoding) -> Self {
        Self::new(structure, encoding, Vec::new())
    }

    /// Row count matches the declared count and every row matches the structure.
    pub fn is_consistent(&self) -> bool {
        let width = self.structure.value_count();
        self.rows.len() == self.element_count && self.rows.iter().all(|r| r.values.len() == width)
    }
}

/// A single observation: who measured what, where and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub procedure: String,
    pub observed_property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_of_interest: Option<String>,
    pub sampling_time: SamplingTime,
    pub result: ResultBlock,
}

impl Observation {
    /// Build an observation whose sampling time spans its rows.
    ///
    /// Returns `None` for an empty block since there is no time to report.
    pub fn from_rows(
        procedure: impl Into<String>,
        observed_property: impl Into<String>,
        feature_of_interest: Option<String>,
        result: ResultBlock,
    ) -> Option<Self> {
        let sampling_time = SamplingTime::span(result.rows.iter().map(|r| r.time))?;
        Some(Self {
            id: None,
            procedure: procedure.into(),
            observed_property: observed_property.into(),
            feature_of_interest,
            sampling_time,
            result,
        })
    }

    /// Keep only rows accepted by every filter.
    ///
    /// Observations without rows are judged on their sampling time. Returns
    /// `None` when nothing survives.
    pub fn restrict(&self, filters: &[TemporalFilter]) -> Option<Self> {
        if filters.is_empty() {
            return Some(self.clone());
        }
        if self.result.rows.is_empty() {
            return crate::filter::matches_all(filters, &self.sampling_time).then(|| self.clone());
        }

        let rows: Vec<ResultRow> = self
            .result
            .rows
            .iter()
            .filter(|row| crate::filter::matches_all_instant(filters, &row.time))
            .cloned()
            .collect();
        let sampling_time = SamplingTime::span(rows.iter().map(|r| r.time))?;

        Some(Self {
            sampling_time,
            result: ResultBlock::new(
                self.result.structure.clone(),
                self.result.encoding.clone(),
                rows,
            ),
            ..self.clone()
        })
    }
}

/// A cached structural description of observations, addressable by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationTemplate {
    pub id: String,
    pub procedure: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<String>,
    pub observed_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_of_interest: Option<String>,
    /// Window implied by the filters the template was created with.
    pub sampling_time: SamplingTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<TemporalFilter>,
    pub result: ResultBlock,
}

/// Procedure description passed through to and from the sensor store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDescription {
    /// Identifier declared by the description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    pub format: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2007, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_version_ordering() {
        assert!(Version::V2_0_0 > Version::V1_0_0);
        assert_eq!(Version::parse("2.0.0"), Some(Version::V2_0_0));
        assert_eq!(Version::parse("3.0.0"), None);
    }

    #[test]
    fn test_response_mode_spellings() {
        assert_eq!(ResponseMode::parse("inline"), Some(ResponseMode::Inline));
        assert_eq!(ResponseMode::parse("RESULT_TEMPLATE"), Some(ResponseMode::ResultTemplate));
        assert_eq!(ResponseMode::parse("resultTemplate"), Some(ResponseMode::ResultTemplate));
        assert_eq!(ResponseMode::parse("out-of-band"), Some(ResponseMode::OutOfBand));
        assert_eq!(ResponseMode::parse("OUT_OF_BAND"), Some(ResponseMode::OutOfBand));
        assert_eq!(ResponseMode::parse("ATTACHED"), Some(ResponseMode::Attached));
        assert_eq!(ResponseMode::parse("streaming"), None);
    }

    #[test]
    fn test_result_model_qnames() {
        assert_eq!(ResultModel::parse("om:Measurement"), Some(ResultModel::Measurement));
        assert_eq!(
            ResultModel::parse("{http://www.opengis.net/om/1.0}Observation"),
            Some(ResultModel::Observation)
        );
        assert_eq!(ResultModel::parse("om:Bogus"), None);
        assert_eq!(ResultModel::parse("{http://example.org}Observation"), None);
        assert_eq!(ResultModel::parse("Observation"), None);
    }

    #[test]
    fn test_structure_validity() {
        let structure = ResultStructure::for_properties(&["urn:ogc:def:phenomenon:GEOM:depth"]);
        assert!(structure.is_valid());
        assert_eq!(structure.value_count(), 1);
        assert_eq!(structure.fields[1].name, "depth");

        assert!(!ResultStructure::new(Vec::new()).is_valid());
        let no_time = ResultStructure::new(vec![Field::quantity("depth", "m")]);
        assert!(!no_time.is_valid());
    }

    #[test]
    fn test_encoding_validity() {
        assert!(TextEncoding::default().is_valid());

        let encoding = |token: &str, block: &str, decimal: &str| TextEncoding {
            token_separator: token.to_string(),
            block_separator: block.to_string(),
            decimal_separator: decimal.to_string(),
        };
        assert!(encoding(";", "\n", ",").is_valid());
        assert!(!encoding("", "@@", ".").is_valid());
        assert!(!encoding(",", "", ".").is_valid());
        assert!(!encoding(",", "@@", "").is_valid());
        assert!(!encoding("@@", "@@", ".").is_valid());
        assert!(!encoding("@", "@@", ".").is_valid());
        assert!(!encoding(",", "@@", ",").is_valid());
    }

    #[test]
    fn test_composite_property_covers_components() {
        let aggregate = ObservedProperty {
            id: "aggregate".to_string(),
            name: None,
            components: vec!["depth".to_string(), "temperature".to_string()],
        };
        assert!(aggregate.is_composite());
        assert!(aggregate.covers("aggregate"));
        assert!(aggregate.covers("temperature"));
        assert!(!aggregate.covers("salinity"));
    }

    #[test]
    fn test_restrict_rows() {
        let structure = ResultStructure::for_properties(&["depth"]);
        let rows = vec![
            ResultRow::quantity(t(2, 59), 6.56),
            ResultRow::quantity(t(3, 59), 6.56),
            ResultRow::quantity(t(4, 59), 6.56),
        ];
        let obs = Observation::from_rows(
            "sensor-1",
            "depth",
            None,
            ResultBlock::new(structure, TextEncoding::default(), rows),
        )
        .unwrap();

        let restricted = obs.restrict(&[TemporalFilter::After(t(3, 0))]).unwrap();
        assert_eq!(restricted.result.element_count, 2);
        assert_eq!(
            restricted.sampling_time,
            SamplingTime::Period(TimePeriod::bounded(t(3, 59), t(4, 59)))
        );

        assert!(obs.restrict(&[TemporalFilter::Before(t(1, 0))]).is_none());
    }

    #[test]
    fn test_block_consistency() {
        let structure = ResultStructure::for_properties(&["depth"]);
        let mut block = ResultBlock::new(
            structure,
            TextEncoding::default(),
            vec![ResultRow::quantity(t(2, 59), 1.0)],
        );
        assert!(block.is_consistent());
        block.element_count = 2;
        assert!(!block.is_consistent());
    }
}
