//! Common types shared across the Sensor Observation Service crates.

pub mod bbox;
pub mod error;
pub mod time;

pub use bbox::{BboxParseError, BoundingBox};
pub use error::{ExceptionCode, ExceptionReport, SosError, SosResult};
pub use time::{SamplingTime, TimeParseError, TimePeriod, TimePosition};
