//! Single-object downloads from S3-compatible stores

use super::{Result, S3Source, TransportError, TransportExecutor, TransportProgress};
use crate::config::ObjectStoreConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::RequestPayer;
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct S3Executor {
    config: ObjectStoreConfig,
}

impl S3Executor {
    pub fn new(config: ObjectStoreConfig) -> Self {
        Self { config }
    }

    /// Build a client for `region`, preferring static keys over the default chain
    async fn client(&self, region: Option<&str>) -> Client {
        let region = Region::new(region.unwrap_or(&self.config.region).to_string());

        let mut builder = match (&self.config.access_key, &self.config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "tabhub-transport");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(region)
            },
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder.force_path_style(self.config.path_style);
        if let Some(ref endpoint) = self.config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        Client::from_conf(builder.build())
    }

    fn staged_name(source: &S3Source) -> &str {
        source.name.as_deref().unwrap_or(&source.key)
    }
}

#[async_trait]
impl TransportExecutor for S3Executor {
    type Source = S3Source;

    async fn can_acquire(&self, source: &S3Source) -> bool {
        !source.bucket.trim().is_empty() && !source.key.trim().is_empty()
    }

    async fn acquire(
        &self,
        source: &S3Source,
        staging: &Path,
        progress: Option<&dyn TransportProgress>,
    ) -> Result<PathBuf> {
        let client = self.client(source.region.as_deref()).await;
        let key = source.object_key();
        info!(bucket = %source.bucket, key = %key, "Fetching object");

        let response = client
            .get_object()
            .bucket(&source.bucket)
            .key(&key)
            .set_request_payer(source.requester_pays.then_some(RequestPayer::Requester))
            .send()
            .await
            .map_err(|e| TransportError::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        let total = response.content_length().and_then(|n| u64::try_from(n).ok());
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| TransportError::ObjectStore(format!("reading {}: {}", key, e)))?
            .into_bytes();

        let destination = staging.join(Self::staged_name(source));
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&destination).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        if let Some(progress) = progress {
            let size = bytes.len() as u64;
            progress.update(size, total.or(Some(size)), size);
            progress.finish();
        }
        debug!(bytes = bytes.len(), path = %destination.display(), "Staged object");
        Ok(destination)
    }

    fn describe(&self, source: &S3Source) -> String {
        format!("s3://{}/{}", source.bucket, source.object_key())
    }
}
