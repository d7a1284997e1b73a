//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur while loading or validating a dataset.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading or writing a dataset
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset file couldn't be parsed
    #[error("Failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g. interaction for an unknown product)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: String },
}

/// Convenience type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, StoreError>;
