//! Error types shared across tabhub crates

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised outside of a specific ingestion layer (configuration, file access, etc.)
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CommonError {
    /// Shorthand for a configuration error on a named setting
    pub fn config(setting: &str, reason: impl std::fmt::Display) -> Self {
        CommonError::Config(format!("{}: {}", setting, reason))
    }
}
