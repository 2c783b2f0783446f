//! Helpers shared by the worker integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

use sos_common::{SosError, SosResult};
use sos_protocol::codec::encode_rows;
use sos_protocol::kvp::KvpParams;
use sos_protocol::{Observation, SosResponse};
use sos_worker::SosWorker;
use test_utils::sample_config_path;

/// A worker running on the sample catalog.
pub async fn running_worker() -> SosWorker {
    let worker = SosWorker::new("test");
    worker
        .init_from_file(sample_config_path())
        .await
        .expect("sample configuration should start");
    worker
}

pub fn kvp(pairs: &[(&str, &str)]) -> KvpParams {
    KvpParams::new(pairs.iter().map(|(k, v)| (*k, v.to_string())))
}

/// 2007-05-01 at the given hour and minute.
pub fn t(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2007, 5, 1, hour, minute, 0).unwrap()
}

pub fn observations(result: SosResult<SosResponse>) -> Vec<Observation> {
    match result.expect("request should succeed") {
        SosResponse::Observations(collection) => collection.observations,
        other => panic!("expected observations, got {:?}", other),
    }
}

/// All rows of the observations in the text encoding.
pub fn encoded(observations: &[Observation]) -> String {
    observations
        .iter()
        .map(|o| encode_rows(&o.result.rows, &o.result.encoding))
        .collect()
}

pub fn result_values(result: SosResult<SosResponse>) -> String {
    match result.expect("request should succeed") {
        SosResponse::ResultValues(values) => values.values,
        other => panic!("expected result values, got {:?}", other),
    }
}

pub fn error(result: SosResult<SosResponse>) -> SosError {
    match result {
        Ok(response) => panic!("expected an exception, got {:?}", response),
        Err(err) => err,
    }
}
