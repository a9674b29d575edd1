//! Error types shared across the bridge
//!
//! Every failure surfaced to a caller falls into one of three classes:
//! runtime stream failures, unsupported or invalid configuration, and
//! single-frame conversion failures. Handle misuse is reported separately
//! so the C surface can tell it apart from backend failures.

use crate::capability::{Feature, PlatformRevision};
use crate::handle::HandleError;
use thiserror::Error;

/// Numeric code reported when a failure carries no platform error code
pub const UNKNOWN_ERROR_CODE: i32 = -1;

/// Errors produced by bridge operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Screenshot error: {0}")]
    Screenshot(String),

    #[error("Handle error: {0}")]
    Handle(#[from] HandleError),
}

impl BridgeError {
    /// Configuration error naming the revision a feature needs
    pub fn unsupported(feature: Feature, running: PlatformRevision) -> Self {
        Self::Configuration(format!(
            "{} requires platform revision {} or newer (running {})",
            feature,
            feature.minimum_revision(),
            running
        ))
    }
}

impl From<StreamFailure> for BridgeError {
    fn from(failure: StreamFailure) -> Self {
        Self::Stream(failure.message)
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Out-of-band failure reported by a running stream
///
/// Unlike [`BridgeError`], this keeps the platform error code so the
/// error delegate can pass it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    code: Option<i32>,
    pub message: String,
}

impl StreamFailure {
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Platform error code, or [`UNKNOWN_ERROR_CODE`] when none was extracted
    pub fn code(&self) -> i32 {
        self.code.unwrap_or(UNKNOWN_ERROR_CODE)
    }
}

impl std::fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code())
    }
}

impl std::error::Error for StreamFailure {}
