//! The SOS worker: lifecycle and request dispatch.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use sos_common::{SosError, SosResult};
use sos_protocol::kvp::{parse_request, KvpParams};
use sos_protocol::locators;
use sos_protocol::{RequestBody, ServiceRequest, SosResponse, Version, SERVICE};

use crate::config::{ConfigError, ServiceConfiguration};
use crate::factory::FactoryRegistry;
use crate::handlers::{self, RequestContext};
use crate::state::ServiceState;
use crate::templates::TemplateManager;

const UNINITIALIZED: u8 = 0;
const RUNNING: u8 = 1;
const DESTROYED: u8 = 2;

/// Observable lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Running,
    Destroyed,
}

enum Slot {
    Running(Arc<ServiceState>),
    Stopped(ConfigError),
}

/// One SOS service instance.
///
/// Shared between request tasks through an `Arc`. Observation templates
/// and their counters belong to the worker itself and survive
/// destroy/init cycles; everything else is rebuilt on init.
pub struct SosWorker {
    id: String,
    lifecycle: AtomicU8,
    slot: RwLock<Slot>,
    factories: Arc<FactoryRegistry>,
    templates: TemplateManager,
}

impl std::fmt::Debug for SosWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SosWorker")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SosWorker {
    /// A worker using the built-in factories.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_factories(id, Arc::new(FactoryRegistry::with_defaults()))
    }

    pub fn with_factories(id: impl Into<String>, factories: Arc<FactoryRegistry>) -> Self {
        Self {
            id: id.into(),
            lifecycle: AtomicU8::new(UNINITIALIZED),
            slot: RwLock::new(Slot::Stopped(ConfigError::Malformed)),
            factories,
            templates: TemplateManager::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.lifecycle.load(Ordering::Acquire) {
            RUNNING => Lifecycle::Running,
            DESTROYED => Lifecycle::Destroyed,
            _ => Lifecycle::Uninitialized,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    /// Why the worker is not running, if it is not.
    pub async fn failure(&self) -> Option<ConfigError> {
        match &*self.slot.read().await {
            Slot::Running(_) if self.is_running() => None,
            Slot::Running(_) => Some(ConfigError::Malformed),
            Slot::Stopped(reason) => Some(reason.clone()),
        }
    }

    /// Bring the worker up, replacing any running state.
    ///
    /// On failure the worker stays stopped and reports the error to every
    /// request.
    pub async fn init(&self, config: Option<ServiceConfiguration>) -> Result<(), ConfigError> {
        match self.build_state(config).await {
            Ok(state) => {
                let mut slot = self.slot.write().await;
                *slot = Slot::Running(Arc::new(state));
                self.lifecycle.store(RUNNING, Ordering::Release);
                drop(slot);
                info!(worker = %self.id, "SOS worker running");
                Ok(())
            }
            Err(err) => {
                self.stop_with(err.clone()).await;
                warn!(worker = %self.id, error = %err, "SOS worker failed to start");
                Err(err)
            }
        }
    }

    /// Load the configuration file then `init`.
    pub async fn init_from_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        match ServiceConfiguration::load(path) {
            Ok(config) => self.init(Some(config)).await,
            Err(err) => {
                self.stop_with(err.clone()).await;
                warn!(worker = %self.id, error = %err, "SOS worker configuration not loaded");
                Err(err)
            }
        }
    }

    /// Stop serving and discard the configuration. Requests already in
    /// flight finish on the state they started with.
    pub async fn destroy(&self) {
        let mut slot = self.slot.write().await;
        *slot = Slot::Stopped(ConfigError::Malformed);
        self.lifecycle.store(DESTROYED, Ordering::Release);
        drop(slot);
        info!(worker = %self.id, "SOS worker destroyed");
    }

    async fn build_state(&self, config: Option<ServiceConfiguration>) -> Result<ServiceState, ConfigError> {
        let config = config.ok_or(ConfigError::Malformed)?;
        config.validate()?;
        let stores = self.factories.build(&config).await?;
        ServiceState::new(config, stores)
            .await
            .map_err(|err| ConfigError::Factory(format!(" {}", err)))
    }

    /// Slot and lifecycle only change together, under the slot write lock.
    async fn stop_with(&self, reason: ConfigError) {
        let mut slot = self.slot.write().await;
        let next = if self.lifecycle.load(Ordering::Acquire) == UNINITIALIZED {
            UNINITIALIZED
        } else {
            DESTROYED
        };
        *slot = Slot::Stopped(reason);
        self.lifecycle.store(next, Ordering::Release);
    }

    /// The running state, or the not-running exception.
    async fn running_state(&self) -> SosResult<Arc<ServiceState>> {
        let slot = self.slot.read().await;
        match &*slot {
            Slot::Running(state) if self.lifecycle.load(Ordering::Acquire) == RUNNING => {
                Ok(Arc::clone(state))
            }
            Slot::Running(_) => Err(not_running(&ConfigError::Malformed)),
            Slot::Stopped(reason) => Err(not_running(reason)),
        }
    }

    /// Serve one request.
    #[instrument(skip(self, request), fields(worker = %self.id, operation = request.operation().as_str()))]
    pub async fn handle(&self, request: ServiceRequest) -> SosResult<SosResponse> {
        let operation = request.operation();
        metrics::counter!("sos_requests_total", "operation" => operation.as_str()).increment(1);

        let result = self.dispatch(request).await;
        if let Err(err) = &result {
            metrics::counter!(
                "sos_request_errors_total",
                "operation" => operation.as_str(),
                "code" => err.exception_code().as_str()
            )
            .increment(1);
            debug!(code = err.exception_code().as_str(), locator = ?err.locator(), "Request rejected");
        }
        result
    }

    /// Serve a request given as key-value pairs.
    pub async fn handle_kvp(&self, params: &KvpParams) -> SosResult<SosResponse> {
        if let Err(err) = self.running_state().await {
            warn!(worker = %self.id, "Request refused, service not running");
            return Err(err);
        }
        let request = parse_request(params)?;
        self.handle(request).await
    }

    async fn dispatch(&self, request: ServiceRequest) -> SosResult<SosResponse> {
        let state = match self.running_state().await {
            Ok(state) => state,
            Err(err) => {
                warn!(worker = %self.id, "Request refused, service not running");
                return Err(err);
            }
        };

        match request.service.as_deref() {
            None => return Err(SosError::missing(locators::SERVICE)),
            Some(SERVICE) => {}
            Some(other) => {
                return Err(SosError::invalid(
                    locators::SERVICE,
                    format!("The service {} is not supported, expected {}", other, SERVICE),
                ))
            }
        }

        if let RequestBody::GetCapabilities(body) = &request.body {
            return handlers::capabilities::get_capabilities(&state, body, request.version.as_deref())
                .await;
        }

        let raw_version = request
            .version
            .as_deref()
            .ok_or_else(|| SosError::missing(locators::VERSION))?;
        let version = Version::parse(raw_version).ok_or_else(|| {
            SosError::invalid(
                locators::VERSION,
                format!("The version {} is not supported", raw_version),
            )
        })?;

        let operation = request.operation();
        if operation.is_transactional() && !state.config.is_transactional() {
            return Err(SosError::not_supported(
                locators::REQUEST,
                format!(
                    "The operation {} is not available in the discovery profile",
                    operation.wire_name(version)
                ),
            ));
        }

        let ctx = RequestContext {
            state: &state,
            templates: &self.templates,
            version,
        };
        debug!(version = %version, "Dispatching");

        match request.body {
            RequestBody::GetCapabilities(body) => {
                handlers::capabilities::get_capabilities(&state, &body, Some(version.as_str())).await
            }
            RequestBody::DescribeSensor(body) => handlers::sensor::describe_sensor(&ctx, body).await,
            RequestBody::GetObservation(body) => {
                handlers::observation::get_observation(&ctx, body).await
            }
            RequestBody::GetObservationById(body) => {
                handlers::observation::get_observation_by_id(&ctx, body).await
            }
            RequestBody::GetResult(body) => handlers::result::get_result(&ctx, body).await,
            RequestBody::GetResultTemplate(body) => {
                handlers::result::get_result_template(&ctx, body).await
            }
            RequestBody::InsertObservation(body) => {
                handlers::observation::insert_observation(&ctx, body).await
            }
            RequestBody::InsertResultTemplate(body) => {
                handlers::result::insert_result_template(&ctx, body).await
            }
            RequestBody::InsertResult(body) => handlers::result::insert_result(&ctx, body).await,
            RequestBody::RegisterSensor(body) => handlers::sensor::register_sensor(&ctx, body).await,
            RequestBody::DeleteSensor(body) => handlers::sensor::delete_sensor(&ctx, body).await,
        }
    }
}

fn not_running(reason: &ConfigError) -> SosError {
    SosError::no_applicable_code(
        None,
        format!("The service is not running!\nCause:{}", reason),
    )
}
