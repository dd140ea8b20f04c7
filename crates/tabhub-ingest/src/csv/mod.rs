//! Streaming CSV ingestion
//!
//! [`CsvIngestor`] reads a delimited byte stream, converts each cell through the codecs of
//! the sink's [`ColumnRegistry`](crate::transform::ColumnRegistry), and hands fixed-size
//! batches of rows to a [`RowSink`]. Cell conversion failures never abort a run: they are
//! collected in an [`ErrorLog`] returned with the [`IngestReport`]. Stream and I/O failures
//! end the run with an [`IngestError`].
//!
//! [`rewrite_file`] is the non-ingesting mode used by transports to re-serialize staged
//! files with a header row or a different separator.

mod error_log;
mod pipeline;
mod rewrite;
mod row;
mod sink;

pub use error_log::{ErrorLog, ErrorSummary};
pub use pipeline::{CsvIngestor, IngestReport, InsertRetryPolicy, PipelineState};
pub use rewrite::{rewrite, rewrite_file, RewriteOptions};
pub use row::Row;
pub use sink::{JsonLinesSink, MemorySink, RowSink, SinkError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV stream error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch insert failed after {attempts} attempt(s): {source}")]
    Insert {
        attempts: u32,
        #[source]
        source: SinkError,
    },

    #[error("Ingestion cancelled")]
    Cancelled,

    #[error("Insert task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
