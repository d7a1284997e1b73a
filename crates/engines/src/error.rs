//! Error types shared by the recommendation engines.
//!
//! Unknown users/products are NOT errors: new entities show up between
//! training cycles all the time, so lookups for them return empty results.
//! Errors are reserved for recommend-before-train, degenerate training
//! inputs, and persistence failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Recommend called before train
    #[error("{engine} model not trained")]
    NotTrained { engine: &'static str },

    /// Training input cannot produce a usable model
    /// (e.g. a decomposition whose effective rank would be zero)
    #[error("Invalid training configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Trained-state blob couldn't be encoded or decoded
    #[error("Model persistence error: {0}")]
    Persistence(#[from] serde_json::Error),

    /// I/O error while saving or loading a model blob
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn not_trained(engine: &'static str) -> Self {
        EngineError::NotTrained { engine }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, EngineError>;
