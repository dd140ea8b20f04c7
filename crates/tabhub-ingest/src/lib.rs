//! Tabhub Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Tools for moving delimited tabular data from remote sources into an analytical store.
//!
//! # Modules
//!
//! - **transform**: column schemas and the per-type codecs that convert CSV cells
//! - **date**: the date format mini-language used by date columns
//! - **decimal**: fixed-precision decimals
//! - **csv**: the streaming ingestion pipeline and the rewrite mode
//! - **transport**: web, S3, Dolt and GitHub acquisition plus the orchestrator
//! - **config**: environment driven settings
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabhub_ingest::csv::{CsvIngestor, MemorySink};
//! use tabhub_ingest::transform::ColumnRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let columns = ColumnRegistry::from_file("schema.json")?;
//!     let sink = Arc::new(MemorySink::new(columns));
//!     let report = CsvIngestor::new().ingest_file("data.csv", sink).await?;
//!     report.errors.log_summary();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod csv;
pub mod date;
pub mod decimal;
pub mod transform;
pub mod transport;

pub use config::{IngestConfig, ObjectStoreConfig};
