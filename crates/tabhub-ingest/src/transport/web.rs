//! HTTP(S) downloads with manual redirect handling

use super::decompression::{self, ArchiveKind};
use super::progress::format_bytes;
use super::{Result, TransportError, TransportExecutor, TransportProgress, WebSource};
use crate::config::IngestConfig;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Downloads [`WebSource`]s and serves the raw-file mode of the GitHub executor
#[derive(Debug, Clone)]
pub struct WebExecutor {
    client: Client,
    redirect_limit: usize,
}

impl WebExecutor {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        // Redirects are followed by hand so the hop limit is per source
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("tabhub-ingest/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            redirect_limit: config.redirect_limit,
        })
    }

    pub fn redirect_limit(&self) -> usize {
        self.redirect_limit
    }

    /// GET `url`, following at most `limit` 301/302 responses
    async fn fetch(&self, url: Url, limit: usize) -> Result<Response> {
        let mut current = url;
        let mut redirects = 0;

        loop {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
                if let Some(location) = response.headers().get(LOCATION) {
                    if redirects >= limit {
                        return Err(TransportError::TooManyRedirects {
                            url: current.to_string(),
                            limit,
                        });
                    }
                    let location = location.to_str().map_err(|_| TransportError::Download {
                        url: current.to_string(),
                        status: status.as_u16(),
                    })?;
                    let next = current.join(location)?;
                    debug!(from = %current, to = %next, hop = redirects + 1, "Following redirect");
                    current = next;
                    redirects += 1;
                    continue;
                }
            }

            if status != StatusCode::OK {
                return Err(TransportError::Download {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }
            return Ok(response);
        }
    }

    /// Download `url` into `destination`, streaming the body to disk.
    ///
    /// A partially written file is removed when the transfer fails.
    #[instrument(skip(self, destination, progress), fields(destination = %destination.display()))]
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        limit: usize,
        progress: Option<&dyn TransportProgress>,
    ) -> Result<u64> {
        let response = self.fetch(Url::parse(url)?, limit).await?;
        let total = response.content_length();
        if let Some(total) = total {
            info!(url, size = %format_bytes(total), "Downloading");
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let result = async {
            let mut downloaded = 0u64;
            if let Some(progress) = progress {
                progress.update(0, total, 0);
            }

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
                if let Some(progress) = progress {
                    progress.update(downloaded, total, chunk.len() as u64);
                }
            }
            file.flush().await?;
            Ok::<_, TransportError>(downloaded)
        }
        .await;

        if let Some(progress) = progress {
            progress.finish();
        }

        match result {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                drop(file);
                if let Err(remove) = tokio::fs::remove_file(destination).await {
                    warn!(error = %remove, "Failed to remove partial download");
                }
                Err(e)
            },
        }
    }

    fn resolve_url(source: &WebSource) -> Result<Url> {
        let mut url = Url::parse(&source.url)?;
        if source.secure && url.scheme() != "https" {
            url.set_scheme("https")
                .map_err(|_| TransportError::invalid(format!("cannot use HTTPS for {}", source.url)))?;
        }
        Ok(url)
    }

    fn staged_name(source: &WebSource) -> Result<String> {
        if let Some(ref name) = source.name {
            return Ok(name.clone());
        }
        let url = Url::parse(&source.url)?;
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                TransportError::invalid(format!("cannot derive a file name from {}", source.url))
            })
    }

    /// Resolve the host of `url`; an unresolvable host makes a download pointless
    pub(crate) async fn host_resolves(url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let port = url.port_or_known_default().unwrap_or(80);
        match tokio::net::lookup_host((host, port)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                debug!(host, error = %e, "Host lookup failed");
                false
            },
        }
    }
}

#[async_trait]
impl TransportExecutor for WebExecutor {
    type Source = WebSource;

    async fn can_acquire(&self, source: &WebSource) -> bool {
        match Self::resolve_url(source) {
            Ok(url) => Self::host_resolves(&url).await,
            Err(_) => false,
        }
    }

    async fn acquire(
        &self,
        source: &WebSource,
        staging: &Path,
        progress: Option<&dyn TransportProgress>,
    ) -> Result<PathBuf> {
        let url = Self::resolve_url(source)?;
        let destination = staging.join(Self::staged_name(source)?);
        if source.mkdir {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let limit = source.redirect_limit.unwrap_or(self.redirect_limit);
        let bytes = self
            .download(url.as_str(), &destination, limit, progress)
            .await?;
        debug!(bytes, path = %destination.display(), "Staged web source");
        Ok(destination)
    }

    async fn post_process(&self, source: &WebSource, staging: &Path) -> Result<()> {
        if !source.unzip {
            return Ok(());
        }
        let archive = staging.join(Self::staged_name(source)?);
        let extracted = decompression::unpack(&archive, ArchiveKind::Zip).await?;
        debug!(path = %extracted.display(), "Unzipped web source");
        Ok(())
    }

    fn describe(&self, source: &WebSource) -> String {
        let mut url = source.url.clone();
        if url.chars().count() > 40 {
            url = url.chars().take(37).collect::<String>() + "...";
        }
        match source.name {
            Some(ref name) => format!("{} --> {}", url, name),
            None => url,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_name() {
        let source = WebSource::new("https://example.com/files/data.csv?x=1");
        assert_eq!(WebExecutor::staged_name(&source).unwrap(), "data.csv");
        let named = source.named("renamed.csv");
        assert_eq!(WebExecutor::staged_name(&named).unwrap(), "renamed.csv");
        assert!(WebExecutor::staged_name(&WebSource::new("https://example.com/")).is_err());
    }

    #[test]
    fn test_secure_upgrades_scheme() {
        let mut source = WebSource::new("http://example.com/a.csv");
        source.secure = true;
        assert_eq!(WebExecutor::resolve_url(&source).unwrap().scheme(), "https");
    }

    #[test]
    fn test_describe_truncates() {
        let executor = WebExecutor::new(&IngestConfig::default()).unwrap();
        let source = WebSource::new(format!("https://example.com/{}", "a".repeat(60)));
        let label = executor.describe(&source);
        assert_eq!(label.chars().count(), 40);
        assert!(label.ends_with("..."));
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let executor = WebExecutor::new(&IngestConfig::default()).unwrap();
        let source = WebSource::new("http://tabhub-unreachable.invalid/a.csv");
        assert!(!executor.can_acquire(&source).await);
    }
}
