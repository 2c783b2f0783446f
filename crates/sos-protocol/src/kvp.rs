//! Key-value-pair request adapter.
//!
//! Translates `key=value` query parameters into a [`ServiceRequest`]. Keys
//! are case-insensitive; list values are comma separated. Only the read
//! operations have a KVP binding.

use sos_common::{BoundingBox, SamplingTime, SosError, SosResult};

use crate::filter::TemporalFilter;
use crate::locators;
use crate::requests::{
    DescribeSensor, GetCapabilities, GetObservation, GetObservationById, GetResult,
    GetResultTemplate, Operation, RequestBody, ServiceRequest,
};

/// Query parameters with lowercased keys, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct KvpParams {
    pairs: Vec<(String, String)>,
}

impl KvpParams {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Parse `key=value` strings, as given on a command line.
    pub fn from_args<I, S>(args: I) -> SosResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = args
            .into_iter()
            .map(|arg| {
                let arg = arg.as_ref();
                arg.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| {
                        SosError::no_applicable_code(
                            None,
                            format!("Malformed request parameter '{}', expected key=value", arg),
                        )
                    })
            })
            .collect::<SosResult<Vec<_>>>()?;
        Ok(Self::new(pairs))
    }

    /// First non-empty value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).into_iter().next()
    }

    /// Every non-empty value of a key, in order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Comma-separated list values of every occurrence of a key.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get_all(key)
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }
}

/// Build the internal request for a KVP parameter set.
pub fn parse_request(params: &KvpParams) -> SosResult<ServiceRequest> {
    let name = params
        .get("request")
        .ok_or_else(|| SosError::missing(locators::REQUEST))?;
    let operation = Operation::from_wire_name(name).ok_or_else(|| {
        SosError::not_supported(
            locators::REQUEST,
            format!("The operation {} is not supported by this service", name),
        )
    })?;
    if operation.is_transactional() {
        return Err(SosError::not_supported(
            locators::REQUEST,
            format!("The operation {} has no key-value-pair binding", name),
        ));
    }

    let body = match operation {
        Operation::GetCapabilities => RequestBody::GetCapabilities(GetCapabilities {
            accept_versions: params.get_list("acceptversions"),
            sections: params.get_list("sections"),
            accept_formats: params.get_list("acceptformats"),
            update_sequence: params.get_string("updatesequence"),
        }),
        Operation::DescribeSensor => RequestBody::DescribeSensor(DescribeSensor {
            procedure: params.get_string("procedure"),
            output_format: params
                .get_string("outputformat")
                .or_else(|| params.get_string("proceduredescriptionformat")),
        }),
        Operation::GetObservation => RequestBody::GetObservation(GetObservation {
            offerings: params.get_list("offering"),
            procedures: params.get_list("procedure"),
            observed_properties: params.get_list("observedproperty"),
            features_of_interest: params.get_list("featureofinterest"),
            temporal_filters: temporal_filters(params)?,
            spatial_filter: spatial_filter(params)?,
            response_format: params.get_string("responseformat"),
            result_model: params.get_string("resultmodel"),
            response_mode: params.get_string("responsemode"),
            srs_name: params.get_string("srsname"),
        }),
        Operation::GetObservationById => RequestBody::GetObservationById(GetObservationById {
            observation_ids: observation_ids(params),
            response_format: params.get_string("responseformat"),
            result_model: params.get_string("resultmodel"),
            response_mode: params.get_string("responsemode"),
            srs_name: params.get_string("srsname"),
        }),
        Operation::GetResult => RequestBody::GetResult(GetResult {
            template_id: params.get_string("observationtemplateid"),
            offering: params.get_string("offering"),
            observed_property: params.get_string("observedproperty"),
            features_of_interest: params.get_list("featureofinterest"),
            temporal_filters: temporal_filters(params)?,
        }),
        Operation::GetResultTemplate => RequestBody::GetResultTemplate(GetResultTemplate {
            offering: params.get_string("offering"),
            observed_property: params.get_string("observedproperty"),
            procedure: params.get_string("procedure"),
            feature_of_interest: params.get_string("featureofinterest"),
            temporal_filters: temporal_filters(params)?,
        }),
        // Transactional operations were rejected above.
        _ => {
            return Err(SosError::not_supported(
                locators::REQUEST,
                format!("The operation {} has no key-value-pair binding", name),
            ))
        }
    };

    Ok(ServiceRequest {
        service: params.get_string("service"),
        version: params.get_string("version"),
        body,
    })
}

fn observation_ids(params: &KvpParams) -> Vec<String> {
    let ids = params.get_list("observation");
    if ids.is_empty() {
        params.get_list("observationid")
    } else {
        ids
    }
}

/// `temporalFilter` (2.0.0) and `eventTime` (1.0.0) values.
fn temporal_filters(params: &KvpParams) -> SosResult<Vec<TemporalFilter>> {
    [
        ("temporalfilter", locators::TEMPORAL_FILTER),
        ("eventtime", locators::EVENT_TIME),
    ]
    .iter()
    .flat_map(|(key, locator)| params.get_all(key).into_iter().map(move |v| (v, *locator)))
    .map(|(value, locator)| {
        parse_temporal_filter(value).ok_or_else(|| {
            SosError::invalid(
                locator,
                format!("The temporal filter '{}' cannot be parsed", value),
            )
        })
    })
    .collect()
}

/// Parse `[valueReference,]expression` where the expression is
/// `begin/end`, an instant, or an instant prefixed by `before:`/`after:`.
pub fn parse_temporal_filter(value: &str) -> Option<TemporalFilter> {
    // Timestamps never contain commas, so anything before the last one is
    // the value reference.
    let expression = value.rsplit(',').next()?.trim();
    let lower = expression.to_ascii_lowercase();

    if lower.starts_with("before:") {
        let t = SamplingTime::parse_kvp(&expression["before:".len()..]).ok()?;
        return match t {
            SamplingTime::Instant(t) => Some(TemporalFilter::Before(t)),
            SamplingTime::Period(_) => None,
        };
    }
    if lower.starts_with("after:") {
        let t = SamplingTime::parse_kvp(&expression["after:".len()..]).ok()?;
        return match t {
            SamplingTime::Instant(t) => Some(TemporalFilter::After(t)),
            SamplingTime::Period(_) => None,
        };
    }

    match SamplingTime::parse_kvp(expression).ok()? {
        SamplingTime::Instant(t) => Some(TemporalFilter::Equals(SamplingTime::Instant(t))),
        SamplingTime::Period(period) => {
            let begin = period.begin.instant()?;
            let end = period.end.instant()?;
            (begin <= end).then_some(TemporalFilter::During(begin, end))
        }
    }
}

/// `bbox` (1.0.0) and `spatialFilter` (2.0.0) values.
fn spatial_filter(params: &KvpParams) -> SosResult<Option<BoundingBox>> {
    let (value, locator) = match (params.get("spatialfilter"), params.get("bbox")) {
        (Some(v), _) => (v, locators::SPATIAL_FILTER),
        (None, Some(v)) => (v, "bbox"),
        (None, None) => return Ok(None),
    };

    // A leading value reference is the only non-numeric first token.
    let coordinates = match value.split_once(',') {
        Some((first, rest)) if first.trim().parse::<f64>().is_err() => rest,
        _ => value,
    };

    BoundingBox::from_kvp(coordinates)
        .map(Some)
        .map_err(|e| SosError::invalid(locator, e.to_string()))
}
