use super::{
    DoltExecutor, GithubExecutor, ProgressBarReporter, Result, S3Executor, TransportDefinition,
    TransportDestination, TransportError, TransportExecutor, TransportProgress, TransportSources,
    WebExecutor,
};
use crate::config::{IngestConfig, ObjectStoreConfig};
use crate::csv::{rewrite_file, RewriteOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Options of one transport run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Root of the final file tree; a fresh directory under the staging root when unset
    pub destination: Option<PathBuf>,
    /// Show download progress and log each step at info level
    pub verbose: bool,
    /// Skip the run when every destination file already exists
    pub use_cache: bool,
}

/// A resolved [`TransportDefinition`], runnable any number of times
#[derive(Debug, Clone)]
pub struct Transport {
    definition: TransportDefinition,
    staging_root: PathBuf,
    web: WebExecutor,
    s3: S3Executor,
    dolt: DoltExecutor,
    github: GithubExecutor,
}

macro_rules! step {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Move `source` to `destination`, copying when a rename is not possible (other filesystem)
async fn relocate(source: &Path, destination: &Path) -> Result<()> {
    if let Err(e) = tokio::fs::rename(source, destination).await {
        debug!(error = %e, "Rename failed, copying instead");
        tokio::fs::copy(source, destination).await?;
        tokio::fs::remove_file(source).await?;
    }
    Ok(())
}

impl Transport {
    /// Resolve with configuration taken from the environment
    pub fn resolve(definition: TransportDefinition) -> Result<Self> {
        let config = IngestConfig::from_env().map_err(|e| TransportError::invalid(e.to_string()))?;
        Self::with_config(definition, &config, ObjectStoreConfig::from_env())
    }

    pub fn with_config(
        definition: TransportDefinition,
        config: &IngestConfig,
        object_store: ObjectStoreConfig,
    ) -> Result<Self> {
        definition.validate()?;
        let web = WebExecutor::new(config)?;
        Ok(Self {
            definition,
            staging_root: config.staging_dir.clone(),
            github: GithubExecutor::new(web.clone())?,
            web,
            s3: S3Executor::new(object_store),
            dolt: DoltExecutor::default(),
        })
    }

    /// Fetch raw GitHub files and clones from `base` instead of github.com
    pub fn with_github_base(mut self, base: Url) -> Self {
        self.github = self.github.with_base(base);
        self
    }

    pub fn with_dolt(mut self, dolt: DoltExecutor) -> Self {
        self.dolt = dolt;
        self
    }

    pub fn definition(&self) -> &TransportDefinition {
        &self.definition
    }

    fn final_path(destination: &Path, dest: &TransportDestination) -> PathBuf {
        destination.join(dest.target())
    }

    /// Whether every destination file exists under `destination`
    pub fn is_cached(&self, destination: &Path) -> bool {
        self.definition
            .destinations
            .iter()
            .all(|dest| Self::final_path(destination, dest).exists())
    }

    /// Whether the files under `destination` are missing or older than the update frequency
    pub fn needs_refresh(&self, destination: &Path) -> bool {
        let interval = self.definition.update_frequency.map(|f| f.interval());
        self.definition.destinations.iter().any(|dest| {
            let path = Self::final_path(destination, dest);
            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => return true,
            };
            match interval {
                Some(interval) => SystemTime::now()
                    .duration_since(modified)
                    .map(|age| age >= interval)
                    .unwrap_or(false),
                None => false,
            }
        })
    }

    /// Stage all sources, then place every destination file.
    ///
    /// Returns the destination directory. A source that fails is logged and skipped; a
    /// destination whose staged file is missing fails the run with
    /// [`TransportError::MissingSourceFile`].
    #[instrument(skip(self), fields(transport = %self.definition.transport_type()))]
    pub async fn run(&self, options: TransportOptions) -> Result<PathBuf> {
        let destination = match options.destination {
            Some(ref destination) => destination.clone(),
            None => self.staging_root.join(format!("tabhub-{}", Uuid::new_v4())),
        };

        if options.use_cache && self.is_cached(&destination) {
            step!(options.verbose, path = %destination.display(), "Using cached files");
            return Ok(destination);
        }

        let staging = self.staging_root.join(format!(
            "csv-{}-{}",
            self.definition.transport_type(),
            Uuid::new_v4()
        ));
        tokio::fs::create_dir_all(&staging).await?;
        step!(
            options.verbose,
            staging = %staging.display(),
            "Starting transport with \"{}\" strategy",
            self.definition.transport_type()
        );

        let result = self.stage_and_place(&staging, &destination, options.verbose).await;

        if self.definition.clean {
            debug!(staging = %staging.display(), "Cleaning staging directory");
            if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
                warn!(staging = %staging.display(), error = %e, "Failed to remove staging directory");
            }
        } else {
            info!(staging = %staging.display(), "Keeping staging directory");
        }

        result?;
        step!(options.verbose, path = %destination.display(), "Completed transport");
        Ok(destination)
    }

    async fn stage_and_place(&self, staging: &Path, destination: &Path, verbose: bool) -> Result<()> {
        match self.definition.sources {
            TransportSources::Web(ref sources) => {
                Self::stage(&self.web, sources, staging, verbose).await
            },
            TransportSources::S3(ref sources) => {
                Self::stage(&self.s3, sources, staging, verbose).await
            },
            TransportSources::Dolt(ref sources) => {
                Self::stage(&self.dolt, sources, staging, verbose).await
            },
            TransportSources::Github(ref sources) => {
                Self::stage(&self.github, sources, staging, verbose).await
            },
        }

        for dest in &self.definition.destinations {
            self.place(dest, staging, destination, verbose).await?;
        }
        Ok(())
    }

    /// Acquire each source; failures are logged and never abort the remaining sources
    async fn stage<E: TransportExecutor>(executor: &E, sources: &[E::Source], staging: &Path, verbose: bool) {
        for source in sources {
            let label = executor.describe(source);
            if !executor.can_acquire(source).await {
                warn!(source = %label, "Cannot acquire source, ensure all identifiers are valid");
                continue;
            }

            step!(verbose, source = %label, "Transporting source");
            let reporter = verbose.then(|| ProgressBarReporter::new(&label));
            let progress = reporter.as_ref().map(|r| r as &dyn TransportProgress);

            let staged = match executor.acquire(source, staging, progress).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(source = %label, error = %e, "Failed to acquire source");
                    continue;
                },
            };
            if let Err(e) = executor.post_process(source, staging).await {
                warn!(source = %label, error = %e, "Failed to post-process source");
                continue;
            }
            debug!(source = %label, path = %staged.display(), "Source staged");
        }
    }

    async fn place(
        &self,
        dest: &TransportDestination,
        staging: &Path,
        destination: &Path,
        verbose: bool,
    ) -> Result<()> {
        let staged = staging.join(&dest.source);
        if !staged.exists() {
            warn!(path = %staged.display(), "Cannot find staged file");
            return Err(TransportError::MissingSourceFile(staged));
        }

        let target = Self::final_path(destination, dest);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        step!(verbose, source = %dest.source, file = %dest.target(), "Moving to destination");

        if dest.needs_rewrite() {
            let options = RewriteOptions {
                add_header: dest.add_header.clone(),
                // ASCII is checked when the definition is validated
                separator: dest.map_separator.map(|c| c as u8),
            };
            let rows = rewrite_file(&staged, &target, &options).await?;
            debug!(rows, file = %target.display(), "Rewrote staged file");
        } else {
            relocate(&staged, &target).await?;
        }
        Ok(())
    }
}
