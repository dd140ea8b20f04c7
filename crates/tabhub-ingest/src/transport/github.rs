//! GitHub repositories: one raw file over HTTP, or a shallow `git clone`

use super::decompression::{self, ArchiveKind};
use super::dolt::{program_available, run_command};
use super::web::WebExecutor;
use super::{GithubSource, Result, TransportError, TransportExecutor, TransportProgress};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

const GITHUB: &str = "https://github.com/";

#[derive(Debug, Clone)]
pub struct GithubExecutor {
    web: WebExecutor,
    base: Url,
    git: PathBuf,
}

impl GithubExecutor {
    pub fn new(web: WebExecutor) -> Result<Self> {
        Ok(Self {
            web,
            base: Url::parse(GITHUB)?,
            git: PathBuf::from("git"),
        })
    }

    /// Serve raw files and clones from another host (GitHub Enterprise, mirrors)
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = base;
        self
    }

    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    /// `{base}/{owner}/{repo}/raw/refs/heads/{branch}/{file}`
    pub fn raw_url(&self, source: &GithubSource, file: &str) -> Result<Url> {
        let path = format!(
            "{}/raw/refs/heads/{}/{}",
            source.repository.trim_matches('/'),
            source.branch,
            file.trim_start_matches('/')
        );
        Ok(self.base.join(&path)?)
    }

    pub fn clone_url(&self, source: &GithubSource) -> Result<Url> {
        Ok(self
            .base
            .join(&format!("{}.git", source.repository.trim_matches('/')))?)
    }
}

#[async_trait]
impl TransportExecutor for GithubExecutor {
    type Source = GithubSource;

    async fn can_acquire(&self, source: &GithubSource) -> bool {
        let mut parts = source.repository.trim_matches('/').split('/');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
        );
        if !well_formed {
            return false;
        }
        match source.file {
            Some(_) => WebExecutor::host_resolves(&self.base).await,
            None => program_available(self.git.as_os_str(), "--version").await,
        }
    }

    async fn acquire(
        &self,
        source: &GithubSource,
        staging: &Path,
        progress: Option<&dyn TransportProgress>,
    ) -> Result<PathBuf> {
        let destination = staging.join(source.local_name());

        match source.file {
            Some(ref file) => {
                let url = self.raw_url(source, file)?;
                if let Some(parent) = destination.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                self.web
                    .download(url.as_str(), &destination, self.web.redirect_limit(), progress)
                    .await?;
            },
            None => {
                let url = self.clone_url(source)?;
                let branch = format!("--branch={}", source.branch);
                run_command(
                    self.git.as_os_str(),
                    [
                        "clone",
                        "--depth=1",
                        branch.as_str(),
                        url.as_str(),
                        source.local_name(),
                    ],
                    staging,
                )
                .await?;
            },
        }
        Ok(destination)
    }

    async fn post_process(&self, source: &GithubSource, staging: &Path) -> Result<()> {
        if source.file.is_none() {
            return Ok(());
        }
        let staged = staging.join(source.local_name());
        let Some(kind) = ArchiveKind::detect(&staged) else {
            return Ok(());
        };
        if !staged.is_file() {
            return Err(TransportError::MissingSourceFile(staged));
        }
        let extracted = decompression::unpack(&staged, kind).await?;
        debug!(path = %extracted.display(), "Extracted raw file");
        Ok(())
    }

    fn describe(&self, source: &GithubSource) -> String {
        match source.file {
            Some(ref file) => format!("github/{}/{}", source.repository, file),
            None => format!("github/{}", source.repository),
        }
    }
}
