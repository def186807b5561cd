//! Vigil error types.
//!
//! The taxonomy separates three kinds of failure:
//!
//! - **Validation failures** are client-fixable and carried as values
//!   (`ValidationError` with a stable code), never as panics.
//! - **External service failures** (semantic analysis, malware scanning,
//!   pattern store) are recovered locally into degraded verdicts by the
//!   components that own them; the variants here exist for the internal
//!   paths where the failure still needs a type.
//! - **Internal errors** are converted into a conservative JSON payload at
//!   the handler boundary rather than surfacing as an HTTP 5xx.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable validation failure codes surfaced to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationCode {
    /// Upload exceeds the configured size cap.
    #[serde(rename = "TOO_LARGE")]
    TooLarge,
    /// Declared media type or extension is not on the allow-list.
    #[serde(rename = "DISALLOWED_TYPE")]
    DisallowedType,
    /// Leading byte signature contradicts the declared extension.
    #[serde(rename = "MAGIC_MISMATCH")]
    MagicMismatch,
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationCode::TooLarge => write!(f, "TOO_LARGE"),
            ValidationCode::DisallowedType => write!(f, "DISALLOWED_TYPE"),
            ValidationCode::MagicMismatch => write!(f, "MAGIC_MISMATCH"),
        }
    }
}

/// A client-fixable upload validation failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code}: {reason}")]
pub struct ValidationError {
    /// Stable machine-readable code.
    pub code: ValidationCode,
    /// Human-readable explanation.
    pub reason: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(code: ValidationCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Vigil errors.
#[derive(Error, Debug)]
pub enum VigilError {
    /// Upload rejected by a validation check.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Semantic analysis or malware-scan backend unreachable or erroring.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Pattern store could not be read.
    #[error("Pattern store error: {0}")]
    PatternStore(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Server-side error.
    #[error("Server error: {0}")]
    Server(String),

    /// Unexpected fault inside the analysis pipeline.
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

impl From<reqwest::Error> for VigilError {
    fn from(err: reqwest::Error) -> Self {
        VigilError::ExternalService(err.to_string())
    }
}

impl From<toml::de::Error> for VigilError {
    fn from(err: toml::de::Error) -> Self {
        VigilError::Config(err.to_string())
    }
}
