//! Error types for the fleet orchestration core.

use crate::models::State;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestrationError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// An ETag precondition on a storage write did not hold
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Expression error: {0}")]
    Expression(String),
    #[error("Provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrchestrationError {
    /// State code reported for this error in an `ActivationStatus`
    pub fn state(&self) -> State {
        match self {
            Self::BadRequest(_) => State::BadRequest,
            Self::NotFound(_) => State::NotFound,
            Self::Conflict(_) => State::Conflict,
            _ => State::InternalError,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Re-tag an expression failure or unknown name as a caller error
    pub(crate) fn into_bad_request(self) -> Self {
        match self {
            Self::Expression(msg) | Self::NotFound(msg) => Self::BadRequest(msg),
            other => other,
        }
    }
}

impl From<serde_json::Error> for OrchestrationError {
    fn from(error: serde_json::Error) -> Self {
        OrchestrationError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<config::ConfigError> for OrchestrationError {
    fn from(error: config::ConfigError) -> Self {
        OrchestrationError::Configuration(error.to_string())
    }
}

pub type OrchestrationResult<T> = std::result::Result<T, OrchestrationError>;
