//! Ingestion configuration
//!
//! Runtime settings for the CSV pipeline and the transports, read from `TABHUB_*`
//! environment variables, plus the object-store connection read from `S3_*`.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tabhub_common::{CommonError, Result};

fn default_batch_size() -> usize {
    1000
}

fn default_insert_max_attempts() -> u32 {
    1
}

fn default_insert_retry_delay_ms() -> u64 {
    500
}

fn default_redirect_limit() -> usize {
    3
}

fn default_http_timeout_secs() -> u64 {
    300
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Pipeline and transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Rows per batch handed to the sink
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Cap on concurrent batch inserts (None = unbounded)
    #[serde(default)]
    pub max_in_flight: Option<usize>,
    /// Attempts per batch insert, 1 disables retries
    #[serde(default = "default_insert_max_attempts")]
    pub insert_max_attempts: u32,
    #[serde(default = "default_insert_retry_delay_ms")]
    pub insert_retry_delay_ms: u64,
    /// Maximum redirects followed by web downloads
    #[serde(default = "default_redirect_limit")]
    pub redirect_limit: usize,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Parent directory of per-run staging directories
    #[serde(default = "env::temp_dir")]
    pub staging_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_in_flight: None,
            insert_max_attempts: default_insert_max_attempts(),
            insert_retry_delay_ms: default_insert_retry_delay_ms(),
            redirect_limit: default_redirect_limit(),
            http_timeout_secs: default_http_timeout_secs(),
            staging_dir: env::temp_dir(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            batch_size: env_parse("TABHUB_BATCH_SIZE").unwrap_or_else(default_batch_size),
            max_in_flight: env_parse("TABHUB_MAX_IN_FLIGHT"),
            insert_max_attempts: env_parse("TABHUB_INSERT_MAX_ATTEMPTS")
                .unwrap_or_else(default_insert_max_attempts),
            insert_retry_delay_ms: env_parse("TABHUB_INSERT_RETRY_DELAY_MS")
                .unwrap_or_else(default_insert_retry_delay_ms),
            redirect_limit: env_parse("TABHUB_REDIRECT_LIMIT").unwrap_or_else(default_redirect_limit),
            http_timeout_secs: env_parse("TABHUB_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(default_http_timeout_secs),
            staging_dir: env::var("TABHUB_STAGING_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(CommonError::config("TABHUB_BATCH_SIZE", "must be greater than 0"));
        }
        if self.max_in_flight == Some(0) {
            return Err(CommonError::config("TABHUB_MAX_IN_FLIGHT", "must be greater than 0"));
        }
        if self.insert_max_attempts == 0 {
            return Err(CommonError::config(
                "TABHUB_INSERT_MAX_ATTEMPTS",
                "must be greater than 0",
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(CommonError::config(
                "TABHUB_HTTP_TIMEOUT_SECS",
                "must be greater than 0",
            ));
        }
        // A missing staging directory is created on the first run
        match std::fs::metadata(&self.staging_dir) {
            Ok(meta) if !meta.is_dir() => Err(CommonError::config(
                "TABHUB_STAGING_DIR",
                format!("{} is not a directory", self.staging_dir.display()),
            )),
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn insert_retry_delay(&self) -> Duration {
        Duration::from_millis(self.insert_retry_delay_ms)
    }
}

/// Object-store connection used by the S3 transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub region: String,
    /// Static credentials; the default AWS chain is used when either is missing
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl ObjectStoreConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            path_style: env_parse("S3_PATH_STYLE").unwrap_or(false),
        }
    }

    /// Whether static keys are configured
    pub fn has_static_credentials(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
            ..Self::default()
        }
    }
}
