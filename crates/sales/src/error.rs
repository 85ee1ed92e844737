//! Unified error handling for the sale engine.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::form::SubmitError;

/// Top-level error for callers that drive the engine end to end.
#[derive(Debug, Error)]
pub enum SalesError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The batch catalog failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The sale is not ready for submission.
    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    /// Input could not be read or understood.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for sale engine operations.
pub type Result<T> = std::result::Result<T, SalesError>;
