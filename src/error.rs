//! Crate-level error types

use thiserror::Error;

use crate::provider::ProviderError;
use crate::session::AccountingError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ReliabilityError>;

/// Top-level error for reliability pipeline operations
#[derive(Debug, Error)]
pub enum ReliabilityError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Accounting(#[from] AccountingError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for ReliabilityError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
