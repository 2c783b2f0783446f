//! DescribeSensor, RegisterSensor and DeleteSensor.

use sos_common::{SosError, SosResult};
use sos_protocol::formats;
use sos_protocol::locators;
use sos_protocol::requests::{DeleteSensor, DescribeSensor, RegisterSensor};
use sos_protocol::responses::{DeleteSensorResponse, RegisterSensorResponse};
use sos_protocol::{Offering, SosResponse, Version};

use super::RequestContext;

pub async fn describe_sensor(ctx: &RequestContext<'_>, request: DescribeSensor) -> SosResult<SosResponse> {
    let format_locator = match ctx.version {
        Version::V1_0_0 => locators::OUTPUT_FORMAT,
        Version::V2_0_0 => locators::DESCRIPTION_FORMAT,
    };
    let format = request
        .output_format
        .as_deref()
        .ok_or_else(|| SosError::missing(format_locator))?;
    if !formats::is_sensor_format(format) {
        return Err(SosError::invalid(
            format_locator,
            format!("The format {} is not a supported sensor description format", format),
        ));
    }

    let procedure = request
        .procedure
        .as_deref()
        .ok_or_else(|| SosError::missing(locators::PROCEDURE))?;

    let description = ctx.state.registry.describe(procedure).await?;
    Ok(SosResponse::SensorDescription(description))
}

/// 1.0.0 registers through an observation template and gets an offering of
/// its own; 2.0.0 registers a bare procedure description.
pub async fn register_sensor(ctx: &RequestContext<'_>, request: RegisterSensor) -> SosResult<SosResponse> {
    let template = match ctx.version {
        Version::V1_0_0 => Some(
            request
                .observation_template
                .ok_or_else(|| SosError::missing(locators::OBSERVATION_TEMPLATE))?,
        ),
        Version::V2_0_0 => None,
    };

    let format = match (ctx.version, request.procedure_description_format) {
        (Version::V2_0_0, None) => {
            return Err(SosError::missing(locators::PROCEDURE_DESCRIPTION_FORMAT))
        }
        (_, format) => format,
    };
    if let Some(format) = format.as_deref() {
        if !formats::is_sensor_format(format) {
            return Err(SosError::invalid(
                locators::PROCEDURE_DESCRIPTION_FORMAT,
                format!("The format {} is not a supported sensor description format", format),
            ));
        }
    }

    let mut description = request
        .description
        .ok_or_else(|| SosError::missing(locators::PROCEDURE_DESCRIPTION))?;
    if let Some(format) = format {
        description.format = format;
    }

    let Some(template) = template else {
        let procedure = ctx.state.registry.register(description, None).await?;
        return Ok(SosResponse::RegisterSensor(RegisterSensorResponse {
            procedure,
            offering: None,
        }));
    };

    let mut offering = Offering::new(String::new());
    offering.observed_properties.extend(template.observed_property);
    offering.features_of_interest.extend(template.feature_of_interest);
    let (procedure, offering_id) = ctx
        .state
        .registry
        .register_with_offering(description, ctx.state.observations.as_ref(), offering)
        .await?;

    Ok(SosResponse::RegisterSensor(RegisterSensorResponse {
        procedure,
        offering: Some(offering_id),
    }))
}

pub async fn delete_sensor(ctx: &RequestContext<'_>, request: DeleteSensor) -> SosResult<SosResponse> {
    let procedure = request
        .procedure
        .ok_or_else(|| SosError::missing(locators::PROCEDURE))?;
    ctx.state.registry.delete(&procedure).await?;
    Ok(SosResponse::DeleteSensor(DeleteSensorResponse { procedure }))
}
