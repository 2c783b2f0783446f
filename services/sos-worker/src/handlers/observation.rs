//! GetObservation, GetObservationById and InsertObservation.

use tracing::debug;

use sos_common::{SosError, SosResult};
use sos_protocol::{codec, locators};
use sos_protocol::requests::{GetObservation, GetObservationById, InsertObservation};
use sos_protocol::responses::{InsertObservationResponse, ObservationCollection};
use sos_protocol::{
    Observation, Offering, ResponseMode, ResultStructure, SosResponse, TextEncoding, Version,
};

use super::{response_mode, result_model, RequestContext};
use crate::store::ObservationFilter;
use crate::templates::NewTemplate;

pub async fn get_observation(ctx: &RequestContext<'_>, request: GetObservation) -> SosResult<SosResponse> {
    let legacy = ctx.version == Version::V1_0_0;

    let response_format = ctx.response_format(request.response_format.as_deref(), legacy)?;
    ctx.srs_name(request.srs_name.as_deref())?;
    let mode = response_mode(request.response_mode.as_deref())?;
    result_model(request.result_model.as_deref())?;

    if legacy && request.offerings.is_empty() {
        return Err(SosError::missing(locators::OFFERING));
    }
    let selected = ctx.offerings(&request.offerings).await?;

    for procedure in &request.procedures {
        ctx.registered_procedure(procedure).await?;
        if !selected.is_empty() && !selected.iter().any(|o| o.has_procedure(procedure)) {
            return Err(SosError::invalid(
                locators::PROCEDURE,
                format!("The procedure {} is not part of the requested offerings", procedure),
            ));
        }
    }

    if legacy && request.observed_properties.is_empty() {
        return Err(SosError::missing(locators::OBSERVED_PROPERTY));
    }
    let scope = ctx.scope(selected.clone()).await?;
    for property in &request.observed_properties {
        ctx.observed_property(property, &scope).await?;
    }

    ctx.features(&request.features_of_interest).await?;

    let filter = ObservationFilter {
        offerings: request.offerings.clone(),
        procedures: request.procedures.clone(),
        observed_properties: request.observed_properties.clone(),
        features_of_interest: request.features_of_interest.clone(),
        bbox: request.spatial_filter.clone(),
    };
    let found = ctx.state.observations.query(&filter).await?;

    if mode == ResponseMode::ResultTemplate {
        return result_templates(ctx, &request, &scope, &found).await;
    }

    let observations: Vec<Observation> = found
        .iter()
        .filter_map(|o| o.restrict(&request.temporal_filters))
        .collect();
    debug!(
        matched = found.len(),
        returned = observations.len(),
        "GetObservation"
    );

    Ok(SosResponse::Observations(ObservationCollection {
        response_format,
        observations,
    }))
}

/// One template per procedure of the matched observations, or per
/// requested procedure.
async fn result_templates(
    ctx: &RequestContext<'_>,
    request: &GetObservation,
    scope: &[Offering],
    found: &[Observation],
) -> SosResult<SosResponse> {
    let mut procedures: Vec<String> = request.procedures.clone();
    if procedures.is_empty() {
        for observation in found {
            if !procedures.contains(&observation.procedure) {
                procedures.push(observation.procedure.clone());
            }
        }
    }

    let feature_of_interest = match request.features_of_interest.as_slice() {
        [single] => Some(single.clone()),
        _ => None,
    };

    let mut pending = Vec::with_capacity(procedures.len());
    for procedure in procedures {
        let own: Vec<&Observation> = found.iter().filter(|o| o.procedure == procedure).collect();

        let observed_properties = if request.observed_properties.is_empty() {
            let mut properties: Vec<String> = Vec::new();
            for observation in &own {
                if !properties.contains(&observation.observed_property) {
                    properties.push(observation.observed_property.clone());
                }
            }
            properties
        } else {
            request.observed_properties.clone()
        };
        if observed_properties.is_empty() {
            return Err(SosError::invalid(
                locators::OBSERVED_PROPERTY,
                format!(
                    "No observed property for '{}': request one or insert observations first",
                    procedure
                ),
            ));
        }

        let (structure, encoding) = match own.first() {
            Some(first) => (
                first.result.structure.clone(),
                first.result.encoding.clone(),
            ),
            None => (
                ResultStructure::for_properties(&observed_properties),
                TextEncoding::default(),
            ),
        };

        let offering = scope
            .iter()
            .find(|o| o.has_procedure(&procedure))
            .map(|o| o.id.clone());

        pending.push(NewTemplate {
            procedure,
            offering,
            observed_properties,
            feature_of_interest: feature_of_interest.clone(),
            filters: request.temporal_filters.clone(),
            structure,
            encoding,
        });
    }

    let mut templates = Vec::with_capacity(pending.len());
    for new in pending {
        templates.push(
            ctx.templates
                .create(new, ctx.state.config.template_sentinel_start)
                .await,
        );
    }

    Ok(SosResponse::Templates(templates))
}

pub async fn get_observation_by_id(
    ctx: &RequestContext<'_>,
    request: GetObservationById,
) -> SosResult<SosResponse> {
    if request.observation_ids.is_empty() {
        return Err(SosError::missing(locators::OBSERVATION));
    }
    let response_format = ctx.response_format(request.response_format.as_deref(), false)?;
    ctx.srs_name(request.srs_name.as_deref())?;
    response_mode(request.response_mode.as_deref())?;
    result_model(request.result_model.as_deref())?;

    let mut observations = Vec::with_capacity(request.observation_ids.len());
    for id in &request.observation_ids {
        let observation = ctx.state.observations.observation(id).await?.ok_or_else(|| {
            SosError::invalid(
                locators::OBSERVATION,
                format!("The observation {} does not exist", id),
            )
        })?;
        observations.push(observation);
    }

    Ok(SosResponse::Observations(ObservationCollection {
        response_format,
        observations,
    }))
}

pub async fn insert_observation(
    ctx: &RequestContext<'_>,
    request: InsertObservation,
) -> SosResult<SosResponse> {
    if request.observations.is_empty() {
        return Err(SosError::missing(locators::OBSERVATION));
    }
    if ctx.version == Version::V2_0_0 && request.offerings.is_empty() {
        return Err(SosError::missing(locators::OFFERING));
    }
    ctx.offerings(&request.offerings).await?;

    for observation in &request.observations {
        ctx.registered_procedure(&observation.procedure).await?;
        if observation.observed_property.is_empty() {
            return Err(SosError::missing(locators::OBSERVED_PROPERTY));
        }
        if !observation.result.structure.is_valid() || !observation.result.is_consistent() {
            return Err(SosError::invalid(
                locators::OBSERVATION,
                format!(
                    "The result of the observation of {} does not match its declared structure",
                    observation.procedure
                ),
            ));
        }
        if let Err(e) = codec::check_rows(&observation.result.rows, &observation.result.encoding) {
            return Err(SosError::invalid(
                locators::OBSERVATION,
                format!("The result of the observation of {}: {}", observation.procedure, e),
            ));
        }
    }

    let observation_ids = ctx
        .state
        .observations
        .insert_observations(&request.offerings, request.observations)
        .await?;
    debug!(inserted = observation_ids.len(), "InsertObservation");

    Ok(SosResponse::InsertObservation(InsertObservationResponse {
        observation_ids,
    }))
}
