//! SOS Worker Library
//!
//! This crate provides the request-processing core of an OGC Sensor
//! Observation Service: worker lifecycle, request dispatch, observation
//! templates, the sensor registry and the store abstractions behind them.

pub mod config;
pub mod factory;
pub mod handlers;
pub mod manager;
pub mod memory;
pub mod registry;
pub mod state;
pub mod store;
pub mod templates;
pub mod worker;

pub use config::{ConfigError, ServiceConfiguration};
pub use manager::ServiceManager;
pub use worker::{Lifecycle, SosWorker};
