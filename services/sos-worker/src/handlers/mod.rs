//! Operation handlers.
//!
//! Each handler validates its parameters in a fixed order, first failure
//! wins, then delegates to the stores, the registry or the template
//! manager.

pub mod capabilities;
pub mod observation;
pub mod result;
pub mod sensor;

use sos_common::{SosError, SosResult};
use sos_protocol::formats;
use sos_protocol::locators;
use sos_protocol::{ObservedProperty, Offering, ResponseMode, ResultModel, Version};

use crate::state::ServiceState;
use crate::templates::TemplateManager;

/// Per-request view of the worker.
pub struct RequestContext<'a> {
    pub state: &'a ServiceState,
    pub templates: &'a TemplateManager,
    pub version: Version,
}

impl RequestContext<'_> {
    /// Validate `responseFormat`, returning the effective format.
    pub(crate) fn response_format(&self, format: Option<&str>, mandatory: bool) -> SosResult<String> {
        let supported = formats::response_formats(self.version);
        match format {
            None if mandatory => Err(SosError::missing(locators::RESPONSE_FORMAT)),
            None => Ok(formats::default_response_format(self.version).to_string()),
            Some(f) if supported.contains(&f.trim()) => Ok(f.trim().to_string()),
            Some(f) => Err(SosError::invalid(
                locators::RESPONSE_FORMAT,
                format!(
                    "The response format {} is not supported in version {}",
                    f, self.version
                ),
            )),
        }
    }

    pub(crate) fn srs_name(&self, srs: Option<&str>) -> SosResult<()> {
        match srs {
            Some(srs) if !self.state.config.supports_srs(srs) => Err(SosError::invalid(
                locators::SRS_NAME,
                format!("The srsName {} is not supported", srs),
            )),
            _ => Ok(()),
        }
    }

    /// Offering by id, or InvalidParameterValue on "offering".
    pub(crate) async fn offering(&self, id: &str) -> SosResult<Offering> {
        self.state.observations.offering(id).await?.ok_or_else(|| {
            SosError::invalid(
                locators::OFFERING,
                format!("The offering {} is not part of this service", id),
            )
        })
    }

    /// Every listed offering must exist.
    pub(crate) async fn offerings(&self, ids: &[String]) -> SosResult<Vec<Offering>> {
        let mut offerings = Vec::with_capacity(ids.len());
        for id in ids {
            offerings.push(self.offering(id).await?);
        }
        Ok(offerings)
    }

    /// A phenomenon must be known and advertised by one of `offerings`,
    /// directly or as a component of an advertised composite.
    pub(crate) async fn observed_property(
        &self,
        property: &str,
        offerings: &[Offering],
    ) -> SosResult<()> {
        let properties = self.state.observations.observed_properties().await?;
        let invalid = || {
            SosError::invalid(
                locators::OBSERVED_PROPERTY,
                format!("The observed property {} is not advertised", property),
            )
        };

        if !properties.iter().any(|p| p.covers(property)) {
            return Err(invalid());
        }
        let advertised = offerings
            .iter()
            .flat_map(|o| o.observed_properties.iter())
            .any(|advertised| covers(&properties, advertised, property));
        if advertised {
            Ok(())
        } else {
            Err(invalid())
        }
    }

    /// Every listed feature of interest must exist.
    pub(crate) async fn features(&self, ids: &[String]) -> SosResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let known = self.state.observations.features().await?;
        match ids.iter().find(|id| !known.iter().any(|f| &f.id == *id)) {
            Some(unknown) => Err(SosError::invalid(
                locators::FEATURE_OF_INTEREST,
                format!("The feature of interest {} is not part of this service", unknown),
            )),
            None => Ok(()),
        }
    }

    /// Registered procedure, or InvalidParameterValue on "procedure".
    pub(crate) async fn registered_procedure(&self, id: &str) -> SosResult<()> {
        if self.state.registry.is_registered(id).await {
            Ok(())
        } else {
            Err(SosError::invalid(
                locators::PROCEDURE,
                format!("The procedure {} is not registered", id),
            ))
        }
    }

    /// Offerings the request addresses: the listed ones, or all of them.
    pub(crate) async fn scope(&self, selected: Vec<Offering>) -> SosResult<Vec<Offering>> {
        if selected.is_empty() {
            Ok(self.state.observations.offerings().await?)
        } else {
            Ok(selected)
        }
    }
}

/// `advertised` is `property` or a composite containing it.
fn covers(properties: &[ObservedProperty], advertised: &str, property: &str) -> bool {
    advertised == property
        || properties
            .iter()
            .find(|p| p.id == advertised)
            .is_some_and(|p| p.covers(property))
}

pub(crate) fn response_mode(mode: Option<&str>) -> SosResult<ResponseMode> {
    let Some(raw) = mode else {
        return Ok(ResponseMode::Inline);
    };
    match ResponseMode::parse(raw) {
        Some(ResponseMode::OutOfBand) => Err(SosError::no_applicable_code(
            Some(locators::RESPONSE_MODE),
            "The response mode out-of-band is not implemented",
        )),
        Some(ResponseMode::Attached) => Err(SosError::not_supported(
            locators::RESPONSE_MODE,
            "The response mode attached is not supported",
        )),
        Some(mode) => Ok(mode),
        None => Err(SosError::invalid(
            locators::RESPONSE_MODE,
            format!("The response mode {} is unknown", raw),
        )),
    }
}

pub(crate) fn result_model(model: Option<&str>) -> SosResult<Option<ResultModel>> {
    model
        .map(|raw| {
            ResultModel::parse(raw).ok_or_else(|| {
                SosError::invalid(
                    locators::RESULT_MODEL,
                    format!("The result model {} is not supported", raw),
                )
            })
        })
        .transpose()
}
