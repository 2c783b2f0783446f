//! Worker lifecycle, configuration failures and request headers.

mod common;

use std::sync::Arc;

use sos_common::ExceptionCode;
use sos_protocol::requests::{DescribeSensor, GetCapabilities, GetResultTemplate, InsertResult};
use sos_protocol::{RequestBody, ServiceRequest, SosResponse, Version};
use sos_worker::{ConfigError, Lifecycle, ServiceManager, SosWorker};
use tokio_test::assert_ok;
use test_utils::{config_yaml, offerings, phenomena, sample_catalog_path, temp_test_dir, write_config};

use common::{error, kvp, running_worker};

fn capabilities() -> ServiceRequest {
    ServiceRequest::capabilities(GetCapabilities::default())
}

fn template_request() -> ServiceRequest {
    ServiceRequest::new(
        Version::V2_0_0,
        GetResultTemplate {
            offering: Some(offerings::DEPTH.to_string()),
            observed_property: Some(phenomena::DEPTH.to_string()),
            ..Default::default()
        },
    )
}

async fn template_id(worker: &SosWorker) -> String {
    match worker.handle(template_request()).await.unwrap() {
        SosResponse::ResultTemplate(response) => response.template_id,
        other => panic!("unexpected response {:?}", other),
    }
}

// ============================================================================
// Lifecycle gating
// ============================================================================

#[tokio::test]
async fn test_destroyed_worker_refuses_then_recovers() {
    let worker = running_worker().await;
    assert_ok!(worker.handle(capabilities()).await);

    worker.destroy().await;
    let err = error(worker.handle(capabilities()).await);
    assert_eq!(err.exception_code(), ExceptionCode::NoApplicableCode);
    assert!(err.message().contains("The service is not running"));
    assert_eq!(
        err.message(),
        "The service is not running!\nCause:The configuration object is malformed or null."
    );

    assert_ok!(worker.init_from_file(test_utils::sample_config_path()).await);
    assert_ok!(worker.handle(capabilities()).await);
}

#[tokio::test]
async fn test_gate_precedes_kvp_parsing() {
    let worker = SosWorker::new("test");
    let err = error(worker.handle_kvp(&kvp(&[("service", "SOS")])).await);
    assert_eq!(err.exception_code(), ExceptionCode::NoApplicableCode);
}

#[tokio::test]
async fn test_template_counters_survive_reinit() {
    let worker = running_worker().await;
    assert_eq!(template_id(&worker).await, "template:urn:ogc:object:sensor:GEOM:3-0");

    worker.destroy().await;
    worker
        .init_from_file(test_utils::sample_config_path())
        .await
        .unwrap();

    let id = template_id(&worker).await;
    assert_eq!(id, "template:urn:ogc:object:sensor:GEOM:3-1");

    // The template created before the destroy is still addressable.
    let err = error(
        worker
            .handle(ServiceRequest::new(
                Version::V2_0_0,
                InsertResult {
                    template_id: Some("template:urn:ogc:object:sensor:GEOM:3-0".to_string()),
                    result_values: Some("not a row".to_string()),
                },
            ))
            .await,
    );
    assert_eq!(err.locator(), Some("resultValues"));
}

#[tokio::test]
async fn test_concurrent_template_ids_never_collide() {
    let worker = Arc::new(running_worker().await);

    let requests = (0..32).map(|_| {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { template_id(&worker).await })
    });
    let ids: Vec<String> = futures::future::join_all(requests)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let unique: std::collections::HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 32);
    for n in 0..32 {
        let expected = format!("template:urn:ogc:object:sensor:GEOM:3-{}", n);
        assert!(ids.contains(&expected), "missing {}", expected);
    }
}

// ============================================================================
// Configuration failures
// ============================================================================

#[tokio::test]
async fn test_missing_configuration_file() {
    let worker = SosWorker::new("test");
    let err = worker.init_from_file("/nonexistent/sos.yaml").await.unwrap_err();
    assert_eq!(err, ConfigError::NotFound);

    let err = error(worker.handle(capabilities()).await);
    assert_eq!(
        err.message(),
        "The service is not running!\nCause:The configuration file can't be found."
    );
}

#[tokio::test]
async fn test_configuration_without_stores() {
    let dir = temp_test_dir();
    let worker = SosWorker::new("test");

    let path = write_config(dir.path(), "no-sml.yaml", "factory: memory\nom:\n  data_file: catalog.yaml\n");
    assert_eq!(worker.init_from_file(&path).await, Err(ConfigError::MissingSml));
    let err = error(worker.handle(capabilities()).await);
    assert!(err
        .message()
        .ends_with("The configuration file does not contains a SML configuration."));

    let path = write_config(dir.path(), "no-om.yaml", "factory: memory\nsml:\n  data_file: catalog.yaml\n");
    assert_eq!(worker.init_from_file(&path).await, Err(ConfigError::MissingOm));
    let err = error(worker.handle(capabilities()).await);
    assert!(err
        .message()
        .ends_with("The configuration file does not contains a O&M configuration."));
}

#[tokio::test]
async fn test_malformed_configuration() {
    let dir = temp_test_dir();
    let path = write_config(dir.path(), "broken.yaml", "sml: [unterminated\n");
    let worker = SosWorker::new("test");
    assert_eq!(worker.init_from_file(&path).await, Err(ConfigError::Malformed));
}

#[tokio::test]
async fn test_unknown_factory() {
    let dir = temp_test_dir();
    let path = write_config(dir.path(), "factory.yaml", "factory: postgres\nsml: {}\nom: {}\n");
    let worker = SosWorker::new("test");
    assert!(matches!(
        worker.init_from_file(&path).await,
        Err(ConfigError::Factory(_))
    ));

    let err = error(worker.handle(capabilities()).await);
    assert!(err
        .message()
        .starts_with("The service is not running!\nCause:Unable to find a SOS Factory."));
    assert!(err.message().contains("postgres"));
}

#[tokio::test]
async fn test_manager_keeps_failed_worker() {
    let manager = ServiceManager::default();
    assert!(manager.start_from_file("broken", "/nonexistent/sos.yaml").await.is_err());

    let worker = manager.get("broken").await.unwrap();
    assert_eq!(worker.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(worker.failure().await, Some(ConfigError::NotFound));

    let worker = manager
        .start_from_file("broken", test_utils::sample_config_path())
        .await
        .unwrap();
    assert!(worker.is_running());
}

// ============================================================================
// Headers and profile
// ============================================================================

#[tokio::test]
async fn test_service_header() {
    let worker = running_worker().await;

    let mut request = capabilities();
    request.service = None;
    let err = error(worker.handle(request).await);
    assert_eq!(err.exception_code(), ExceptionCode::MissingParameterValue);
    assert_eq!(err.locator(), Some("service"));

    let mut request = capabilities();
    request.service = Some("WMS".to_string());
    let err = error(worker.handle(request).await);
    assert_eq!(err.exception_code(), ExceptionCode::InvalidParameterValue);
    assert_eq!(err.locator(), Some("service"));
}

#[tokio::test]
async fn test_version_header() {
    let worker = running_worker().await;
    let body = RequestBody::DescribeSensor(DescribeSensor::default());

    let request = ServiceRequest {
        service: Some("SOS".to_string()),
        version: None,
        body: body.clone(),
    };
    let err = error(worker.handle(request).await);
    assert_eq!(err.exception_code(), ExceptionCode::MissingParameterValue);
    assert_eq!(err.locator(), Some("version"));

    let request = ServiceRequest {
        service: Some("SOS".to_string()),
        version: Some("3.0.0".to_string()),
        body,
    };
    let err = error(worker.handle(request).await);
    assert_eq!(err.exception_code(), ExceptionCode::InvalidParameterValue);
    assert_eq!(err.locator(), Some("version"));
}

#[tokio::test]
async fn test_discovery_profile_rejects_transactions() {
    let dir = temp_test_dir();
    let path = write_config(
        dir.path(),
        "discovery.yaml",
        &config_yaml(&sample_catalog_path(), "discovery"),
    );
    let worker = SosWorker::new("test");
    worker.init_from_file(&path).await.unwrap();

    let err = error(
        worker
            .handle(ServiceRequest::new(Version::V2_0_0, InsertResult::default()))
            .await,
    );
    assert_eq!(err.exception_code(), ExceptionCode::OperationNotSupported);
    assert_eq!(err.locator(), Some("request"));

    match worker.handle(capabilities()).await.unwrap() {
        SosResponse::Capabilities(caps) => {
            let operations = caps.operations_metadata.unwrap();
            assert!(operations.operation("GetObservation").is_some());
            assert!(operations.operation("InsertObservation").is_none());
            assert!(operations.operation("InsertSensor").is_none());
        }
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn test_transactional_requests_have_no_kvp_binding() {
    let worker = running_worker().await;
    let err = error(
        worker
            .handle_kvp(&kvp(&[
                ("service", "SOS"),
                ("version", "2.0.0"),
                ("request", "InsertObservation"),
            ]))
            .await,
    );
    assert_eq!(err.exception_code(), ExceptionCode::OperationNotSupported);
    assert_eq!(err.locator(), Some("request"));
}
