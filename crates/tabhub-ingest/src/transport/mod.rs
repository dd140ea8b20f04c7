//! Transports: acquire delimited files from remote sources into a local directory tree
//!
//! A [`TransportDefinition`] names one strategy (`web`, `s3`, `dolt` or `github`), the
//! sources to fetch with it and the destinations to produce from the fetched files.
//! [`Transport::resolve`] turns a definition into a reusable runner; each
//! [`Transport::run`] stages the sources in a fresh directory and then moves (or rewrites)
//! the staged files into the destination tree.
//!
//! # Example
//!
//! ```no_run
//! use tabhub_ingest::transport::{Transport, TransportDefinition, TransportOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let definition: TransportDefinition = serde_json::from_str(r#"{
//!     "type": "web",
//!     "source": { "url": "https://example.com/data.csv" },
//!     "destination": { "source": "data.csv", "add_header": ["id", "name"] }
//! }"#)?;
//!
//! let transport = Transport::resolve(definition)?;
//! let dir = transport.run(TransportOptions::default()).await?;
//! println!("files in {}", dir.display());
//! # Ok(())
//! # }
//! ```

pub mod decompression;
mod dolt;
mod error;
mod executor;
mod github;
mod orchestrator;
mod progress;
mod s3;
mod web;

pub use dolt::DoltExecutor;
pub use error::{Result, TransportError};
pub use executor::TransportExecutor;
pub use github::GithubExecutor;
pub use orchestrator::{Transport, TransportOptions};
pub use progress::{ProgressBarReporter, TransportProgress};
pub use s3::S3Executor;
pub use web::WebExecutor;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::time::Duration;

/// Transport strategy tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Web,
    S3,
    Dolt,
    Github,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Web => "web",
            TransportType::S3 => "s3",
            TransportType::Dolt => "dolt",
            TransportType::Github => "github",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "master".to_string()
}

/// File downloaded over HTTP(S)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSource {
    pub url: String,
    /// Staged file name, the last URL path segment when unset
    #[serde(default)]
    pub name: Option<String>,
    /// Require HTTPS
    #[serde(default)]
    pub secure: bool,
    /// Extract the downloaded `.zip` archive
    #[serde(default)]
    pub unzip: bool,
    /// Create missing parent directories of `name`
    #[serde(default = "default_true")]
    pub mkdir: bool,
    #[serde(default, alias = "redirectLimit")]
    pub redirect_limit: Option<usize>,
}

impl WebSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            secure: false,
            unzip: false,
            mkdir: true,
            redirect_limit: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Single object in an S3-compatible bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Source {
    pub bucket: String,
    pub key: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, alias = "requesterPays")]
    pub requester_pays: bool,
}

impl S3Source {
    /// Full object key including the prefix
    pub fn object_key(&self) -> String {
        match self.prefix.as_deref().map(|p| p.trim_end_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix, self.key),
            _ => self.key.clone(),
        }
    }
}

/// Dolt repository cloned and dumped to CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoltSource {
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Local folder name, the last repository path segment when unset
    #[serde(default)]
    pub name: Option<String>,
}

/// GitHub repository, or a single raw file from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubSource {
    /// `owner/name`
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Path of one file in the repository; the whole repository is cloned when unset
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

impl DoltSource {
    pub fn local_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| last_segment(&self.repository))
    }
}

impl GithubSource {
    pub fn local_name(&self) -> &str {
        match (&self.name, &self.file) {
            (Some(name), _) => name.as_str(),
            (None, Some(file)) => last_segment(file),
            (None, None) => last_segment(&self.repository),
        }
    }
}

/// Sources of one definition, grouped under their strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSources {
    Web(Vec<WebSource>),
    S3(Vec<S3Source>),
    Dolt(Vec<DoltSource>),
    Github(Vec<GithubSource>),
}

impl TransportSources {
    pub fn transport_type(&self) -> TransportType {
        match self {
            TransportSources::Web(_) => TransportType::Web,
            TransportSources::S3(_) => TransportType::S3,
            TransportSources::Dolt(_) => TransportType::Dolt,
            TransportSources::Github(_) => TransportType::Github,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TransportSources::Web(s) => s.len(),
            TransportSources::S3(s) => s.len(),
            TransportSources::Dolt(s) => s.len(),
            TransportSources::Github(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths each source writes under the staging directory, when known before download
    fn staged_names(&self) -> Vec<&str> {
        match self {
            TransportSources::Web(s) => s.iter().filter_map(|s| s.name.as_deref()).collect(),
            TransportSources::S3(s) => s
                .iter()
                .map(|s| s.name.as_deref().unwrap_or(&s.key))
                .collect(),
            TransportSources::Dolt(s) => s.iter().map(DoltSource::local_name).collect(),
            TransportSources::Github(s) => s.iter().map(GithubSource::local_name).collect(),
        }
    }
}

/// Mapping from a staged file to a file of the destination tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDestination {
    /// Path of the staged file, relative to the staging directory
    pub source: String,
    /// Path of the final file, relative to the destination; defaults to `source`
    #[serde(default)]
    pub file: Option<String>,
    /// Header row to prepend
    #[serde(default, alias = "addHeader")]
    pub add_header: Option<Vec<String>>,
    /// Field separator of the staged file when it is not `,`
    #[serde(default, alias = "mapSeparator")]
    pub map_separator: Option<char>,
}

impl TransportDestination {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file: None,
            add_header: None,
            map_separator: None,
        }
    }

    pub fn target(&self) -> &str {
        self.file.as_deref().unwrap_or(&self.source)
    }

    /// Whether the staged file has to go through the CSV rewrite
    pub fn needs_rewrite(&self) -> bool {
        self.add_header.is_some() || self.map_separator.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

/// How often the transported files should be refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateFrequency {
    Period(Period),
    Hours(u64),
}

impl UpdateFrequency {
    pub fn interval(&self) -> Duration {
        const HOUR: u64 = 60 * 60;
        let hours = match self {
            UpdateFrequency::Period(Period::Day) => 24,
            UpdateFrequency::Period(Period::Week) => 24 * 7,
            UpdateFrequency::Period(Period::Month) => 24 * 30,
            UpdateFrequency::Period(Period::Year) => 24 * 365,
            UpdateFrequency::Hours(hours) => *hours,
        };
        Duration::from_secs(hours.saturating_mul(HOUR))
    }
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(rename = "type")]
    transport_type: TransportType,
    source: serde_json::Value,
    destination: OneOrMany<TransportDestination>,
    #[serde(default = "default_true")]
    clean: bool,
    #[serde(default)]
    update_frequency: Option<UpdateFrequency>,
}

/// Complete description of a transport
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDefinition")]
pub struct TransportDefinition {
    pub sources: TransportSources,
    pub destinations: Vec<TransportDestination>,
    /// Delete the staging directory after each run
    pub clean: bool,
    pub update_frequency: Option<UpdateFrequency>,
}

fn sources_from<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> std::result::Result<Vec<T>, serde_json::Error> {
    serde_json::from_value::<OneOrMany<T>>(value).map(OneOrMany::into_vec)
}

impl TryFrom<RawDefinition> for TransportDefinition {
    type Error = TransportError;

    fn try_from(raw: RawDefinition) -> Result<Self> {
        let invalid = |e: serde_json::Error| {
            TransportError::invalid(format!("{} source: {}", raw.transport_type, e))
        };
        let sources = match raw.transport_type {
            TransportType::Web => TransportSources::Web(sources_from(raw.source).map_err(invalid)?),
            TransportType::S3 => TransportSources::S3(sources_from(raw.source).map_err(invalid)?),
            TransportType::Dolt => {
                TransportSources::Dolt(sources_from(raw.source).map_err(invalid)?)
            },
            TransportType::Github => {
                TransportSources::Github(sources_from(raw.source).map_err(invalid)?)
            },
        };

        let definition = Self {
            sources,
            destinations: raw.destination.into_vec(),
            clean: raw.clean,
            update_frequency: raw.update_frequency,
        };
        definition.validate()?;
        Ok(definition)
    }
}

/// Reject paths that would escape the directory they are joined onto
fn check_relative(path: &str) -> Result<()> {
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(TransportError::invalid(format!(
            "'{}' must be a relative path inside the directory",
            path
        )));
    }
    Ok(())
}

impl TransportDefinition {
    pub fn new(sources: TransportSources, destinations: Vec<TransportDestination>) -> Self {
        Self {
            sources,
            destinations,
            clean: true,
            update_frequency: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TransportError::invalid(e.to_string()))
    }

    pub fn transport_type(&self) -> TransportType {
        self.sources.transport_type()
    }

    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(TransportError::invalid("at least one destination is required"));
        }
        for name in self.sources.staged_names() {
            check_relative(name)?;
        }
        for destination in &self.destinations {
            check_relative(&destination.source)?;
            check_relative(destination.target())?;
            if let Some(separator) = destination.map_separator {
                if !separator.is_ascii() {
                    return Err(TransportError::invalid(format!(
                        "separator '{}' is not an ASCII character",
                        separator
                    )));
                }
            }
        }
        Ok(())
    }
}
