//! GetResult, GetResultTemplate, InsertResultTemplate and InsertResult.

use tracing::debug;

use sos_common::{SosError, SosResult};
use sos_protocol::codec::{decode, encode_rows};
use sos_protocol::locators;
use sos_protocol::requests::{GetResult, GetResultTemplate, InsertResult, InsertResultTemplate};
use sos_protocol::responses::{
    InsertResultResponse, InsertResultTemplateResponse, ResultTemplateResponse,
    ResultValuesResponse,
};
use sos_protocol::{
    Observation, ObservationTemplate, ResultBlock, ResultStructure, SosResponse, TemporalFilter,
    TextEncoding, Version,
};

use super::RequestContext;
use crate::store::ObservationFilter;
use crate::templates::NewTemplate;

pub async fn get_result(ctx: &RequestContext<'_>, request: GetResult) -> SosResult<SosResponse> {
    if let Some(id) = request.template_id.as_deref() {
        let template = ctx.templates.get(id).await.ok_or_else(|| {
            SosError::invalid(
                locators::OBSERVATION_TEMPLATE_ID,
                format!("The template {} does not exist", id),
            )
        })?;
        return result_for_template(ctx, template, &request.temporal_filters).await;
    }

    if ctx.version == Version::V1_0_0 {
        return Err(SosError::missing(locators::OBSERVATION_TEMPLATE_ID));
    }

    let offering_id = request
        .offering
        .as_deref()
        .ok_or_else(|| SosError::missing(locators::OFFERING))?;
    let offering = ctx.offering(offering_id).await?;
    let property = request
        .observed_property
        .as_deref()
        .ok_or_else(|| SosError::missing(locators::OBSERVED_PROPERTY))?;
    ctx.observed_property(property, std::slice::from_ref(&offering))
        .await?;
    ctx.features(&request.features_of_interest).await?;

    let filter = ObservationFilter {
        offerings: vec![offering.id],
        observed_properties: vec![property.to_string()],
        features_of_interest: request.features_of_interest,
        ..ObservationFilter::default()
    };
    let found = ctx.state.observations.query(&filter).await?;

    let mut values = String::new();
    for observation in found
        .iter()
        .filter_map(|o| o.restrict(&request.temporal_filters))
    {
        values.push_str(&encode_rows(
            &observation.result.rows,
            &observation.result.encoding,
        ));
    }

    Ok(SosResponse::ResultValues(ResultValuesResponse {
        template_id: None,
        values,
    }))
}

/// Rows of the template's observations that pass both the filters stored
/// with the template and the request's own filters.
async fn result_for_template(
    ctx: &RequestContext<'_>,
    template: ObservationTemplate,
    request_filters: &[TemporalFilter],
) -> SosResult<SosResponse> {
    ctx.registered_procedure(&template.procedure).await?;

    let filter = ObservationFilter {
        offerings: template.offering.iter().cloned().collect(),
        procedures: vec![template.procedure.clone()],
        observed_properties: template.observed_properties.clone(),
        features_of_interest: template.feature_of_interest.iter().cloned().collect(),
        bbox: None,
    };
    let found = ctx.state.observations.query(&filter).await?;

    let filters: Vec<TemporalFilter> = template
        .filters
        .iter()
        .chain(request_filters)
        .cloned()
        .collect();

    let mut values = String::new();
    let mut rows = 0usize;
    for observation in found.iter().filter_map(|o| o.restrict(&filters)) {
        rows += observation.result.rows.len();
        values.push_str(&encode_rows(
            &observation.result.rows,
            &template.result.encoding,
        ));
    }
    debug!(template = %template.id, rows, "GetResult");

    Ok(SosResponse::ResultValues(ResultValuesResponse {
        template_id: Some(template.id),
        values,
    }))
}

pub async fn get_result_template(
    ctx: &RequestContext<'_>,
    request: GetResultTemplate,
) -> SosResult<SosResponse> {
    let offering_id = request
        .offering
        .as_deref()
        .ok_or_else(|| SosError::missing(locators::OFFERING))?;
    let offering = ctx.offering(offering_id).await?;

    let property = request
        .observed_property
        .ok_or_else(|| SosError::missing(locators::OBSERVED_PROPERTY))?;
    ctx.observed_property(&property, std::slice::from_ref(&offering))
        .await?;

    let procedure = match request.procedure {
        Some(procedure) => {
            ctx.registered_procedure(&procedure).await?;
            if !offering.has_procedure(&procedure) {
                return Err(SosError::invalid(
                    locators::PROCEDURE,
                    format!(
                        "The procedure {} is not part of the offering {}",
                        procedure, offering.id
                    ),
                ));
            }
            procedure
        }
        None => ctx
            .state
            .registry
            .registered()
            .await
            .into_iter()
            .find(|p| offering.has_procedure(p))
            .ok_or_else(|| {
                SosError::invalid(
                    locators::OFFERING,
                    format!("The offering {} has no registered procedure", offering.id),
                )
            })?,
    };

    if let Some(feature) = request.feature_of_interest.as_ref() {
        ctx.features(std::slice::from_ref(feature)).await?;
    }

    let filter = ObservationFilter {
        offerings: vec![offering.id.clone()],
        procedures: vec![procedure.clone()],
        observed_properties: vec![property.clone()],
        ..ObservationFilter::default()
    };
    let (structure, encoding) = match ctx.state.observations.query(&filter).await?.first() {
        Some(first) => (first.result.structure.clone(), first.result.encoding.clone()),
        None => (
            ResultStructure::for_properties(std::slice::from_ref(&property)),
            TextEncoding::default(),
        ),
    };

    let template = ctx
        .templates
        .create(
            NewTemplate {
                procedure,
                offering: Some(offering.id),
                observed_properties: vec![property],
                feature_of_interest: request.feature_of_interest,
                filters: request.temporal_filters,
                structure,
                encoding,
            },
            ctx.state.config.template_sentinel_start,
        )
        .await;

    Ok(SosResponse::ResultTemplate(ResultTemplateResponse {
        template_id: template.id,
        result_structure: template.result.structure,
        result_encoding: template.result.encoding,
    }))
}

pub async fn insert_result_template(
    ctx: &RequestContext<'_>,
    request: InsertResultTemplate,
) -> SosResult<SosResponse> {
    let offering_id = request
        .offering
        .as_deref()
        .ok_or_else(|| SosError::missing(locators::OFFERING))?;
    let offering = ctx.offering(offering_id).await?;

    let proposal = request
        .proposed_template
        .ok_or_else(|| SosError::missing(locators::PROPOSED_TEMPLATE))?;

    let procedure = proposal
        .procedure
        .ok_or_else(|| SosError::missing(locators::PROCEDURE))?;
    ctx.registered_procedure(&procedure).await?;

    let property = proposal
        .observed_property
        .ok_or_else(|| SosError::missing(locators::OBSERVED_PROPERTY))?;
    let known = ctx.state.observations.observed_properties().await?;
    if !known.iter().any(|p| p.covers(&property)) {
        return Err(SosError::invalid(
            locators::OBSERVED_PROPERTY,
            format!("The observed property {} is not known", property),
        ));
    }

    if let Some(feature) = proposal.feature_of_interest.as_ref() {
        ctx.features(std::slice::from_ref(feature)).await?;
    }

    let structure = request
        .result_structure
        .ok_or_else(|| SosError::missing(locators::RESULT_STRUCTURE))?;
    if !structure.is_valid() {
        return Err(SosError::invalid(
            locators::RESULT_STRUCTURE,
            "The result structure must start with a time field and hold no other",
        ));
    }
    let encoding = request
        .result_encoding
        .ok_or_else(|| SosError::missing(locators::RESULT_ENCODING))?;
    if !encoding.is_valid() {
        return Err(SosError::invalid(
            locators::RESULT_ENCODING,
            "Separators must be non-empty and must not contain one another",
        ));
    }

    let template = ctx
        .templates
        .create(
            NewTemplate {
                procedure,
                offering: Some(offering.id),
                observed_properties: vec![property],
                feature_of_interest: proposal.feature_of_interest,
                filters: Vec::new(),
                structure,
                encoding,
            },
            ctx.state.config.template_sentinel_start,
        )
        .await;

    Ok(SosResponse::InsertResultTemplate(
        InsertResultTemplateResponse {
            template_id: template.id,
        },
    ))
}

/// Decode `resultValues` against the template and persist the rows as a
/// single observation. A malformed block rejects the whole payload.
pub async fn insert_result(ctx: &RequestContext<'_>, request: InsertResult) -> SosResult<SosResponse> {
    let id = request
        .template_id
        .as_deref()
        .ok_or_else(|| SosError::missing(locators::TEMPLATE))?;
    let template = ctx.templates.get(id).await.ok_or_else(|| {
        SosError::invalid(
            locators::TEMPLATE,
            format!("The template {} does not exist", id),
        )
    })?;

    let values = request
        .result_values
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SosError::missing(locators::RESULT_VALUES))?;

    let structure = &template.result.structure;
    let encoding = &template.result.encoding;
    let rows = decode(values, structure, encoding)
        .map_err(|err| SosError::invalid(locators::RESULT_VALUES, err.to_string()))?;

    let property = template.observed_properties.first().cloned().ok_or_else(|| {
        SosError::invalid(
            locators::TEMPLATE,
            format!("The template {} carries no observed property", template.id),
        )
    })?;
    let inserted_rows = rows.len();
    let observation = Observation::from_rows(
        template.procedure.clone(),
        property,
        template.feature_of_interest.clone(),
        ResultBlock::new(structure.clone(), encoding.clone(), rows),
    )
    .ok_or_else(|| {
        SosError::invalid(locators::RESULT_VALUES, "The result values hold no row")
    })?;

    ctx.registered_procedure(&template.procedure).await?;

    let offerings: Vec<String> = template.offering.iter().cloned().collect();
    ctx.state
        .observations
        .insert_observations(&offerings, vec![observation])
        .await?;
    debug!(template = %template.id, rows = inserted_rows, "InsertResult");

    Ok(SosResponse::InsertResult(InsertResultResponse { inserted_rows }))
}
