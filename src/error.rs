//! Error types for the prioritization core

use thiserror::Error;

use crate::context::token_estimator::EstimationError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors raised by a prioritization pass
#[derive(Debug, Error)]
pub enum ContextError {
    /// The token oracle could not price a piece of content. Budgets are
    /// meaningless without a count, so this always aborts the pass.
    #[error("Token estimation unavailable: {0}")]
    TokenEstimation(String),

    #[error("Configuration invalid: {0}")]
    Configuration(String),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl From<EstimationError> for ContextError {
    fn from(err: EstimationError) -> Self {
        ContextError::TokenEstimation(err.to_string())
    }
}

impl ContextError {
    /// Whether this error comes from the token oracle
    pub fn is_estimation_failure(&self) -> bool {
        matches!(self, ContextError::TokenEstimation(_))
    }
}
