//! Streaming CSV to batched insert pipeline

use super::{ErrorLog, IngestError, Result, Row, RowSink, SinkError};
use crate::config::IngestConfig;
use crate::transform::{Column, NativeValue};
use csv_async::{AsyncReaderBuilder, StringRecord};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Lifecycle of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Reading,
    Ended,
    Failed,
}

/// How often a failed batch insert is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertRetryPolicy {
    /// Total attempts per batch, including the first
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `delay * n` before retrying
    pub delay: Duration,
}

impl Default for InsertRetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl InsertRetryPolicy {
    /// A single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub rows: usize,
    pub batches: usize,
    pub errors: ErrorLog,
}

/// Reads CSV input and inserts converted rows into a [`RowSink`]
#[derive(Debug, Clone)]
pub struct CsvIngestor {
    batch_size: usize,
    delimiter: u8,
    headers: Option<Vec<String>>,
    max_in_flight: Option<usize>,
    retry: InsertRetryPolicy,
    cancel: CancellationToken,
}

impl Default for CsvIngestor {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: b',',
            headers: None,
            max_in_flight: None,
            retry: InsertRetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }
}

struct Run {
    state: PipelineState,
}

impl Run {
    fn transition(&mut self, next: PipelineState) {
        debug!(from = ?self.state, to = ?next, "Pipeline state");
        self.state = next;
    }
}

async fn insert_with_retry<S>(
    sink: Arc<S>,
    batch: Vec<Row>,
    batch_size: usize,
    policy: InsertRetryPolicy,
) -> Result<usize>
where
    S: RowSink + ?Sized,
{
    let mut last_error: Option<SinkError> = None;

    for attempt in 1..=policy.max_attempts {
        match sink.insert_batch(&batch, batch_size).await {
            Ok(()) => return Ok(batch.len()),
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    rows = batch.len(),
                    error = %e,
                    "Batch insert failed"
                );
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay * attempt).await;
                }
            },
        }
    }

    Err(IngestError::Insert {
        attempts: policy.max_attempts,
        source: last_error
            .unwrap_or_else(|| SinkError::Rejected("no insert attempt was made".to_string())),
    })
}

fn finish_insert(result: std::result::Result<Result<usize>, tokio::task::JoinError>) -> Result<()> {
    result??;
    Ok(())
}

impl CsvIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_in_flight: config.max_in_flight,
            retry: InsertRetryPolicy::linear(
                config.insert_max_attempts,
                Duration::from_millis(config.insert_retry_delay_ms),
            ),
            ..Self::default()
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Column headers for input without a header row
    pub fn headers(mut self, headers: Vec<String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Cap concurrent batch inserts; reading pauses while the cap is reached
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight.max(1));
        self
    }

    pub fn retry(mut self, retry: InsertRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Convert one record, recording cell failures in `errors`
    fn convert(
        record: &StringRecord,
        headers: &[String],
        columns: &[Option<&Column>],
        errors: &mut ErrorLog,
    ) -> Row {
        let raw = |field: Option<&str>| match field {
            Some(field) => NativeValue::String(field.to_string()),
            None => NativeValue::Null,
        };

        let mut row = Row::with_capacity(headers.len());
        for (index, (header, column)) in headers.iter().zip(columns).enumerate() {
            // Short records leave trailing cells absent rather than dropping the column
            let field = record.get(index);
            let value = match column {
                Some(column) => match column.parse(field) {
                    Ok(value) => value,
                    Err(err) => match column.default_value() {
                        Some(default) => default.clone(),
                        None => {
                            errors.record(column.name(), err);
                            raw(field)
                        },
                    },
                },
                None => raw(field),
            };
            row.push(header.as_str(), value);
        }
        row
    }

    async fn acquire_permit(
        &self,
        semaphore: &Option<Arc<Semaphore>>,
    ) -> Result<Option<OwnedSemaphorePermit>> {
        let Some(semaphore) = semaphore else {
            return Ok(None);
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IngestError::Cancelled),
            permit = Arc::clone(semaphore).acquire_owned() => {
                permit.map(Some).map_err(|_| IngestError::Cancelled)
            },
        }
    }

    /// Stream `reader` into `sink`.
    ///
    /// Every full batch is inserted in the background while reading continues; the call
    /// resolves once all inserts have finished.
    #[instrument(skip_all, fields(batch_size = self.batch_size))]
    pub async fn ingest<R, S>(&self, reader: R, sink: Arc<S>) -> Result<IngestReport>
    where
        R: AsyncRead + Unpin + Send,
        S: RowSink + ?Sized + 'static,
    {
        let mut run = Run {
            state: PipelineState::Idle,
        };
        let mut inserts: JoinSet<Result<usize>> = JoinSet::new();
        let result = self.read_batches(reader, &sink, &mut inserts, &mut run).await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                run.transition(PipelineState::Failed);
                inserts.abort_all();
                return Err(e);
            },
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(IngestError::Cancelled),
                next = inserts.join_next() => Ok(next),
            };
            let outcome = match next {
                Ok(Some(joined)) => finish_insert(joined),
                Ok(None) => break,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                run.transition(PipelineState::Failed);
                inserts.abort_all();
                return Err(e);
            }
        }

        if let Err(source) = sink.flush().await {
            run.transition(PipelineState::Failed);
            return Err(IngestError::Insert {
                attempts: 1,
                source,
            });
        }

        run.transition(PipelineState::Ended);
        info!(
            rows = report.rows,
            batches = report.batches,
            errors = report.errors.count(),
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn read_batches<R, S>(
        &self,
        reader: R,
        sink: &Arc<S>,
        inserts: &mut JoinSet<Result<usize>>,
        run: &mut Run,
    ) -> Result<IngestReport>
    where
        R: AsyncRead + Unpin + Send,
        S: RowSink + ?Sized + 'static,
    {
        let mut csv = AsyncReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.headers.is_none())
            .flexible(true)
            .create_reader(reader);

        let raw_headers: Vec<String> = match self.headers {
            Some(ref headers) => headers.clone(),
            None => csv.headers().await?.iter().map(str::to_string).collect(),
        };

        let registry = sink.columns();
        let headers: Vec<String> = raw_headers
            .iter()
            .map(|h| registry.resolve_header(h).to_string())
            .collect();
        let columns: Vec<Option<&Column>> = headers
            .iter()
            .map(|name| registry.column_by_name(name))
            .collect();
        for (header, column) in headers.iter().zip(&columns) {
            if column.is_none() {
                debug!(header = %header, "Unknown column, values kept as text");
            }
        }

        let semaphore = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        let mut report = IngestReport::default();
        let mut batch: Vec<Row> = Vec::with_capacity(self.batch_size);
        let mut record = StringRecord::new();
        run.transition(PipelineState::Reading);

        loop {
            let more = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(IngestError::Cancelled),
                more = csv.read_record(&mut record) => more?,
            };
            if more {
                batch.push(Self::convert(&record, &headers, &columns, &mut report.errors));
                report.rows += 1;
            }

            if batch.len() >= self.batch_size || (!more && !batch.is_empty()) {
                let permit = self.acquire_permit(&semaphore).await?;
                let rows = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                let sink = Arc::clone(sink);
                let (batch_size, retry) = (self.batch_size, self.retry);
                inserts.spawn(async move {
                    let inserted = insert_with_retry(sink, rows, batch_size, retry).await;
                    drop(permit);
                    inserted
                });
                report.batches += 1;
            }

            // Surface insert failures without waiting for the end of the stream
            while let Some(joined) = inserts.try_join_next() {
                finish_insert(joined)?;
            }

            if !more {
                break;
            }
        }

        Ok(report)
    }

    /// Ingest a file from disk
    pub async fn ingest_file<S>(&self, path: impl AsRef<Path>, sink: Arc<S>) -> Result<IngestReport>
    where
        S: RowSink + ?Sized + 'static,
    {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening CSV file");
        let file = tokio::fs::File::open(path).await?;
        self.ingest(file, sink).await
    }
}
