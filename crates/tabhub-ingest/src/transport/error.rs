use crate::csv::IngestError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while acquiring or placing transport files
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Download of {url} failed with HTTP status {status}")]
    Download { url: String, status: u16 },

    #[error("Too many redirects fetching {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{program} {args}` failed: {stderr}")]
    Command {
        program: String,
        args: String,
        stderr: String,
    },

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Cannot find source file {}", .0.display())]
    MissingSourceFile(PathBuf),

    #[error("Invalid transport definition: {0}")]
    InvalidDefinition(String),

    #[error("Rewrite failed: {0}")]
    Rewrite(#[from] IngestError),
}

impl TransportError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        TransportError::InvalidDefinition(reason.into())
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::InvalidDefinition(format!("invalid URL: {}", err))
    }
}

impl From<zip::result::ZipError> for TransportError {
    fn from(err: zip::result::ZipError) -> Self {
        TransportError::Archive(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
