//! Error types shared across the FIRDS workspace

use thiserror::Error;

/// Result type alias for shared FIRDS operations
pub type Result<T> = std::result::Result<T, FirdsError>;

/// Main error type for shared utilities
#[derive(Error, Debug)]
pub enum FirdsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Logging error: {0}")]
    Logging(String),
}
