//! OWS exception taxonomy for SOS operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using SosError.
pub type SosResult<T> = Result<T, SosError>;

/// OWS exception codes raised by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionCode {
    MissingParameterValue,
    InvalidParameterValue,
    VersionNegotiationFailed,
    OperationNotSupported,
    NoApplicableCode,
}

impl ExceptionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionCode::MissingParameterValue => "MissingParameterValue",
            ExceptionCode::InvalidParameterValue => "InvalidParameterValue",
            ExceptionCode::VersionNegotiationFailed => "VersionNegotiationFailed",
            ExceptionCode::OperationNotSupported => "OperationNotSupported",
            ExceptionCode::NoApplicableCode => "NoApplicableCode",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary error type for SOS operations.
///
/// Every variant carries the locator of the offending request parameter
/// (when one applies) and a human readable message.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SosError {
    #[error("{message}")]
    MissingParameterValue {
        locator: Option<String>,
        message: String,
    },

    #[error("{message}")]
    InvalidParameterValue {
        locator: Option<String>,
        message: String,
    },

    #[error("{message}")]
    VersionNegotiationFailed {
        locator: Option<String>,
        message: String,
    },

    #[error("{message}")]
    OperationNotSupported {
        locator: Option<String>,
        message: String,
    },

    #[error("{message}")]
    NoApplicableCode {
        locator: Option<String>,
        message: String,
    },
}

impl SosError {
    /// A mandatory parameter is absent.
    pub fn missing(locator: &str) -> Self {
        SosError::MissingParameterValue {
            locator: Some(locator.to_string()),
            message: format!("{} must be specified", locator),
        }
    }

    /// A parameter is present but unusable.
    pub fn invalid(locator: &str, message: impl Into<String>) -> Self {
        SosError::InvalidParameterValue {
            locator: Some(locator.to_string()),
            message: message.into(),
        }
    }

    pub fn version_negotiation(locator: &str, message: impl Into<String>) -> Self {
        SosError::VersionNegotiationFailed {
            locator: Some(locator.to_string()),
            message: message.into(),
        }
    }

    pub fn not_supported(locator: &str, message: impl Into<String>) -> Self {
        SosError::OperationNotSupported {
            locator: Some(locator.to_string()),
            message: message.into(),
        }
    }

    /// Failure with no more specific code. `locator` may be absent.
    pub fn no_applicable_code(locator: Option<&str>, message: impl Into<String>) -> Self {
        SosError::NoApplicableCode {
            locator: locator.map(str::to_string),
            message: message.into(),
        }
    }

    /// Get the OWS exception code for this error.
    pub fn exception_code(&self) -> ExceptionCode {
        match self {
            SosError::MissingParameterValue { .. } => ExceptionCode::MissingParameterValue,
            SosError::InvalidParameterValue { .. } => ExceptionCode::InvalidParameterValue,
            SosError::VersionNegotiationFailed { .. } => ExceptionCode::VersionNegotiationFailed,
            SosError::OperationNotSupported { .. } => ExceptionCode::OperationNotSupported,
            SosError::NoApplicableCode { .. } => ExceptionCode::NoApplicableCode,
        }
    }

    /// Name of the offending request parameter, if any.
    pub fn locator(&self) -> Option<&str> {
        match self {
            SosError::MissingParameterValue { locator, .. }
            | SosError::InvalidParameterValue { locator, .. }
            | SosError::VersionNegotiationFailed { locator, .. }
            | SosError::OperationNotSupported { locator, .. }
            | SosError::NoApplicableCode { locator, .. } => locator.as_deref(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SosError::MissingParameterValue { message, .. }
            | SosError::InvalidParameterValue { message, .. }
            | SosError::VersionNegotiationFailed { message, .. }
            | SosError::OperationNotSupported { message, .. }
            | SosError::NoApplicableCode { message, .. } => message,
        }
    }

    /// Get the HTTP status code a transport should use for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            SosError::MissingParameterValue { .. }
            | SosError::InvalidParameterValue { .. }
            | SosError::VersionNegotiationFailed { .. } => 400,
            SosError::OperationNotSupported { .. } => 501,
            SosError::NoApplicableCode { .. } => 500,
        }
    }

    /// Convert to an OWS exception report.
    pub fn to_exception_report(&self) -> ExceptionReport {
        ExceptionReport {
            version: "1.1.0".to_string(),
            exceptions: vec![OwsException {
                exception_code: self.exception_code(),
                locator: self.locator().map(str::to_string),
                exception_text: self.message().to_string(),
            }],
        }
    }
}

/// OWS 1.1 exception report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionReport {
    pub version: String,
    pub exceptions: Vec<OwsException>,
}

/// A single entry of an exception report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwsException {
    pub exception_code: ExceptionCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub exception_text: String,
}

impl From<serde_json::Error> for SosError {
    fn from(err: serde_json::Error) -> Self {
        SosError::no_applicable_code(None, format!("JSON error: {}", err))
    }
}
