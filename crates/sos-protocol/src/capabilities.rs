//! Version negotiation and capabilities document construction.

use sos_common::{SosError, SosResult};

use crate::formats;
use crate::locators;
use crate::requests::{GetCapabilities, Operation};
use crate::responses::{
    Capabilities, Contents, FilterCapabilities, OfferingSummary, OperationMetadata,
    OperationsMetadata, ParameterDomain, ServiceIdentification, ServiceProvider,
};
use crate::types::{Offering, ResponseMode, ResultModel, Version};

/// Capabilities sections that can be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    All,
    ServiceIdentification,
    ServiceProvider,
    OperationsMetadata,
    Contents,
    FilterCapabilities,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::All,
        Section::ServiceIdentification,
        Section::ServiceProvider,
        Section::OperationsMetadata,
        Section::Contents,
        Section::FilterCapabilities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::All => "All",
            Section::ServiceIdentification => "ServiceIdentification",
            Section::ServiceProvider => "ServiceProvider",
            Section::OperationsMetadata => "OperationsMetadata",
            Section::Contents => "Contents",
            Section::FilterCapabilities => "Filter_Capabilities",
        }
    }

    /// Case-insensitive; `Filter_Capabilities` and `FilterCapabilities` both match.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted: String = s.trim().chars().filter(|c| *c != '_').collect();
        Self::ALL.iter().copied().find(|section| {
            let name: String = section.as_str().chars().filter(|c| *c != '_').collect();
            name.eq_ignore_ascii_case(&wanted)
        })
    }
}

/// Pick the protocol version of a GetCapabilities response.
///
/// `accept_versions` wins over the single `version` form; with neither the
/// highest supported version is used.
pub fn negotiate_version(
    supported: &[Version],
    accept_versions: &[String],
    version: Option<&str>,
) -> SosResult<Version> {
    if !accept_versions.is_empty() {
        return accept_versions
            .iter()
            .filter_map(|v| Version::parse(v))
            .filter(|v| supported.contains(v))
            .max()
            .ok_or_else(|| {
                SosError::version_negotiation(
                    locators::ACCEPT_VERSION,
                    format!(
                        "None of the accepted versions [{}] is supported by this service",
                        accept_versions.join(",")
                    ),
                )
            });
    }

    if let Some(requested) = version {
        return Version::parse(requested)
            .filter(|v| supported.contains(v))
            .ok_or_else(|| {
                SosError::invalid(
                    locators::ACCEPT_VERSION,
                    format!("The version {} is not supported by this service", requested),
                )
            });
    }

    supported.iter().copied().max().ok_or_else(|| {
        SosError::no_applicable_code(None, "No protocol version is supported by this service")
    })
}

/// Pick the capabilities document format.
pub fn negotiate_format(accept_formats: &[String]) -> SosResult<&'static str> {
    if accept_formats.is_empty() {
        return Ok(formats::ACCEPT_FORMATS[0]);
    }
    accept_formats
        .iter()
        .find_map(|wanted| {
            formats::ACCEPT_FORMATS
                .iter()
                .copied()
                .find(|supported| supported.eq_ignore_ascii_case(wanted.trim()))
        })
        .ok_or_else(|| {
            SosError::invalid(
                locators::ACCEPT_FORMATS,
                format!("None of the formats [{}] is supported", accept_formats.join(",")),
            )
        })
}

/// Catalog state needed to describe the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    pub offerings: Vec<Offering>,
    /// Registered, non-deleted procedures.
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features: Vec<String>,
}

/// Builds sectioned capabilities documents.
#[derive(Debug, Clone)]
pub struct CapabilitiesBuilder {
    pub versions: Vec<Version>,
    pub identification: ServiceIdentification,
    pub provider: ServiceProvider,
    /// Whether the transactional operations are offered.
    pub transactional: bool,
    pub update_sequence: Option<String>,
}

impl CapabilitiesBuilder {
    pub fn new(identification: ServiceIdentification, provider: ServiceProvider) -> Self {
        Self {
            versions: Version::ALL.to_vec(),
            identification,
            provider,
            transactional: true,
            update_sequence: None,
        }
    }

    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    pub fn update_sequence(mut self, update_sequence: Option<String>) -> Self {
        self.update_sequence = update_sequence;
        self
    }

    /// Build the capabilities answering `request`.
    ///
    /// Validation order: version, formats, sections.
    pub fn build(
        &self,
        request: &GetCapabilities,
        version: Option<&str>,
        catalog: &CatalogSnapshot,
    ) -> SosResult<Capabilities> {
        let version = negotiate_version(&self.versions, &request.accept_versions, version)?;
        let format = negotiate_format(&request.accept_formats)?;
        let sections = request
            .sections
            .iter()
            .map(|name| {
                Section::parse(name).ok_or_else(|| {
                    SosError::invalid(
                        locators::SECTIONS,
                        format!("The section {} is not a capabilities section", name),
                    )
                })
            })
            .collect::<SosResult<Vec<_>>>()?;

        let wants = |section: Section| {
            sections.is_empty() || sections.contains(&Section::All) || sections.contains(&section)
        };

        Ok(Capabilities {
            version: version.as_str().to_string(),
            format: format.to_string(),
            update_sequence: self.update_sequence.clone(),
            service_identification: wants(Section::ServiceIdentification)
                .then(|| self.service_identification()),
            service_provider: wants(Section::ServiceProvider).then(|| self.provider.clone()),
            operations_metadata: wants(Section::OperationsMetadata)
                .then(|| self.operations_metadata(version, catalog)),
            contents: wants(Section::Contents).then(|| contents(version, catalog)),
            filter_capabilities: wants(Section::FilterCapabilities)
                .then(FilterCapabilities::default),
        })
    }

    fn service_identification(&self) -> ServiceIdentification {
        ServiceIdentification {
            service_type: "OGC:SOS".to_string(),
            service_type_versions: self.versions.iter().map(|v| v.as_str().to_string()).collect(),
            ..self.identification.clone()
        }
    }

    fn operations_metadata(&self, version: Version, catalog: &CatalogSnapshot) -> OperationsMetadata {
        let operations = Operation::ALL
            .iter()
            .filter(|op| self.transactional || !op.is_transactional())
            .map(|op| OperationMetadata {
                name: op.wire_name(version).to_string(),
                parameters: self.parameters(*op, version, catalog),
            })
            .collect();
        OperationsMetadata { operations }
    }

    fn parameters(
        &self,
        operation: Operation,
        version: Version,
        catalog: &CatalogSnapshot,
    ) -> Vec<ParameterDomain> {
        let offerings = || domain(locators::OFFERING, catalog.offerings.iter().map(|o| o.id.as_str()));
        let procedures = || domain(locators::PROCEDURE, catalog.procedures.iter().map(String::as_str));
        let properties = || {
            domain(
                locators::OBSERVED_PROPERTY,
                catalog.observed_properties.iter().map(String::as_str),
            )
        };
        let features = || {
            domain(
                locators::FEATURE_OF_INTEREST,
                catalog.features.iter().map(String::as_str),
            )
        };
        let response_formats = || {
            domain(
                locators::RESPONSE_FORMAT,
                formats::response_formats(version).iter().copied(),
            )
        };
        let models = || domain(locators::RESULT_MODEL, result_models().into_iter());
        let modes = || domain(locators::RESPONSE_MODE, response_modes().into_iter());
        let sensor_formats = |name: &str| domain(name, formats::SENSOR_FORMATS.iter().copied());

        match operation {
            Operation::GetCapabilities => vec![
                domain("AcceptVersions", self.versions.iter().map(|v| v.as_str())),
                domain("Sections", Section::ALL.iter().map(|s| s.as_str())),
                domain("AcceptFormats", formats::ACCEPT_FORMATS.iter().copied()),
            ],
            Operation::DescribeSensor => vec![
                procedures(),
                sensor_formats(match version {
                    Version::V1_0_0 => locators::OUTPUT_FORMAT,
                    Version::V2_0_0 => locators::DESCRIPTION_FORMAT,
                }),
            ],
            Operation::GetObservation => vec![
                offerings(),
                procedures(),
                properties(),
                features(),
                response_formats(),
                models(),
                modes(),
            ],
            Operation::GetObservationById => {
                vec![response_formats(), models(), modes()]
            }
            Operation::GetResult | Operation::GetResultTemplate => {
                vec![offerings(), properties(), features()]
            }
            Operation::InsertObservation | Operation::InsertResultTemplate => vec![offerings()],
            Operation::InsertResult => Vec::new(),
            Operation::RegisterSensor => vec![sensor_formats(locators::PROCEDURE_DESCRIPTION_FORMAT)],
            Operation::DeleteSensor => vec![procedures()],
        }
    }
}

fn domain<'a>(name: &str, values: impl Iterator<Item = &'a str>) -> ParameterDomain {
    ParameterDomain {
        name: name.to_string(),
        allowed_values: values.map(str::to_string).collect(),
    }
}

fn result_models() -> Vec<&'static str> {
    vec![ResultModel::Observation.as_str(), ResultModel::Measurement.as_str()]
}

fn response_modes() -> Vec<&'static str> {
    vec![
        ResponseMode::Inline.as_str(),
        ResponseMode::ResultTemplate.as_str(),
    ]
}

fn contents(version: Version, catalog: &CatalogSnapshot) -> Contents {
    let offerings = catalog
        .offerings
        .iter()
        .map(|offering| OfferingSummary {
            id: offering.id.clone(),
            name: offering.name.clone(),
            procedures: offering.procedures.clone(),
            observed_properties: offering.observed_properties.clone(),
            features_of_interest: offering.features_of_interest.clone(),
            time: offering.time,
            bbox: offering.bbox.clone(),
            response_formats: formats::response_formats(version)
                .iter()
                .map(|f| f.to_string())
                .collect(),
            result_models: result_models().into_iter().map(str::to_string).collect(),
            response_modes: response_modes().into_iter().map(str::to_string).collect(),
        })
        .collect();
    Contents { offerings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sos_common::ExceptionCode;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::new(ServiceIdentification::default(), ServiceProvider::default())
    }

    fn catalog() -> CatalogSnapshot {
        let mut offering = Offering::new("offering-3");
        offering.procedures = strings(&["urn:ogc:object:sensor:GEOM:3"]);
        offering.observed_properties = strings(&["urn:ogc:def:phenomenon:GEOM:depth"]);
        CatalogSnapshot {
            offerings: vec![offering],
            procedures: strings(&["urn:ogc:object:sensor:GEOM:3"]),
            observed_properties: strings(&["urn:ogc:def:phenomenon:GEOM:depth"]),
            features: strings(&["station-1"]),
        }
    }

    #[test]
    fn test_accept_versions_picks_highest_supported() {
        let v = negotiate_version(&Version::ALL, &strings(&["1.0.0", "2.0.0"]), None).unwrap();
        assert_eq!(v, Version::V2_0_0);
        let v = negotiate_version(&Version::ALL, &strings(&["3.0.0", "1.0.0"]), None).unwrap();
        assert_eq!(v, Version::V1_0_0);
    }

    #[test]
    fn test_unsupported_accept_versions_fail_negotiation() {
        let err = negotiate_version(&Version::ALL, &strings(&["3.0.0"]), None).unwrap_err();
        assert_eq!(err.exception_code(), ExceptionCode::VersionNegotiationFailed);
        assert_eq!(err.locator(), Some("acceptVersion"));
    }

    #[test]
    fn test_single_unsupported_version_is_invalid() {
        let err = negotiate_version(&Version::ALL, &[], Some("3.0.0")).unwrap_err();
        assert_eq!(err.exception_code(), ExceptionCode::InvalidParameterValue);
        assert_eq!(err.locator(), Some("acceptVersion"));
        assert_eq!(
            negotiate_version(&Version::ALL, &[], Some("1.0.0")).unwrap(),
            Version::V1_0_0
        );
        assert_eq!(negotiate_version(&Version::ALL, &[], None).unwrap(), Version::V2_0_0);
    }

    #[test]
    fn test_format_negotiation() {
        assert_eq!(negotiate_format(&[]).unwrap(), "text/xml");
        assert_eq!(
            negotiate_format(&strings(&["application/json", "application/xml"])).unwrap(),
            "application/xml"
        );
        let err = negotiate_format(&strings(&["application/json"])).unwrap_err();
        assert_eq!(err.locator(), Some("acceptFormats"));
    }

    #[test]
    fn test_section_names() {
        assert_eq!(Section::parse("contents"), Some(Section::Contents));
        assert_eq!(Section::parse("Filter_Capabilities"), Some(Section::FilterCapabilities));
        assert_eq!(Section::parse("FilterCapabilities"), Some(Section::FilterCapabilities));
        assert_eq!(Section::parse("Everything"), None);
    }

    #[test]
    fn test_only_requested_sections_present() {
        let request = GetCapabilities {
            sections: strings(&["ServiceIdentification", "Contents"]),
            ..Default::default()
        };
        let caps = builder().build(&request, None, &catalog()).unwrap();
        assert!(caps.service_identification.is_some());
        assert!(caps.contents.is_some());
        assert!(caps.service_provider.is_none());
        assert!(caps.operations_metadata.is_none());
        assert!(caps.filter_capabilities.is_none());
    }

    #[test]
    fn test_all_sections_by_default() {
        let caps = builder()
            .build(&GetCapabilities::default(), None, &catalog())
            .unwrap();
        assert_eq!(caps.version, "2.0.0");
        assert!(caps.service_provider.is_some());
        assert!(caps.filter_capabilities.is_some());
        let identification = caps.service_identification.unwrap();
        assert_eq!(identification.service_type, "OGC:SOS");
    }

    #[test]
    fn test_unknown_section_rejected() {
        let request = GetCapabilities {
            sections: strings(&["Bogus"]),
            ..Default::default()
        };
        let err = builder().build(&request, None, &catalog()).unwrap_err();
        assert_eq!(err.locator(), Some("sections"));
    }

    #[test]
    fn test_operation_names_follow_version() {
        let request = GetCapabilities {
            accept_versions: strings(&["1.0.0"]),
            ..Default::default()
        };
        let caps = builder().build(&request, None, &catalog()).unwrap();
        let metadata = caps.operations_metadata.unwrap();
        assert!(metadata.operation("RegisterSensor").is_some());
        assert!(metadata.operation("InsertSensor").is_none());

        let caps = builder()
            .build(&GetCapabilities::default(), None, &catalog())
            .unwrap();
        let metadata = caps.operations_metadata.unwrap();
        assert!(metadata.operation("InsertSensor").is_some());
    }

    #[test]
    fn test_discovery_profile_hides_transactions() {
        let caps = builder()
            .transactional(false)
            .build(&GetCapabilities::default(), None, &catalog())
            .unwrap();
        let metadata = caps.operations_metadata.unwrap();
        assert!(metadata.operation("InsertObservation").is_none());
        assert!(metadata.operation("DeleteSensor").is_none());
        let get_observation = metadata.operation("GetObservation").unwrap();
        let offerings = get_observation.parameter("offering").unwrap();
        assert_eq!(offerings.allowed_values, vec!["offering-3".to_string()]);
    }

    #[test]
    fn test_update_sequence_echoed() {
        let caps = builder()
            .update_sequence(Some("2007-05-01".to_string()))
            .build(&GetCapabilities::default(), None, &catalog())
            .unwrap();
        assert_eq!(caps.update_sequence.as_deref(), Some("2007-05-01"));
    }
}
