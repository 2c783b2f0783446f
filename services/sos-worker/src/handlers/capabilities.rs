//! GetCapabilities.

use tracing::debug;

use sos_common::SosResult;
use sos_protocol::requests::GetCapabilities;
use sos_protocol::SosResponse;

use crate::state::ServiceState;

/// GetCapabilities carries no mandatory version; `version` is the optional
/// single-version form negotiated alongside `acceptVersions`.
pub async fn get_capabilities(
    state: &ServiceState,
    request: &GetCapabilities,
    version: Option<&str>,
) -> SosResult<SosResponse> {
    let catalog = state.catalog_snapshot().await?;
    let capabilities = state.capabilities.build(request, version, &catalog)?;
    debug!(
        version = %capabilities.version,
        offerings = catalog.offerings.len(),
        "Built capabilities"
    );
    Ok(SosResponse::Capabilities(Box::new(capabilities)))
}
