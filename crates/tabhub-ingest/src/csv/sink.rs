//! Batched-insert sinks

use super::Row;
use crate::transform::{ColumnRegistry, ValidationError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Column '{column}' rejected value: {source}")]
    Validation {
        column: String,
        #[source]
        source: ValidationError,
    },

    #[error("Insert rejected: {0}")]
    Rejected(String),
}

/// Destination of ingested rows
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Insert one batch. May be called concurrently for different batches.
    async fn insert_batch(&self, rows: &[Row], batch_size_hint: usize) -> Result<(), SinkError>;

    /// Columns of the target table, addressable by name or source alias
    fn columns(&self) -> &ColumnRegistry;

    /// Called once after every batch of a run has been inserted
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps inserted rows in memory
#[derive(Debug)]
pub struct MemorySink {
    columns: ColumnRegistry,
    rows: Mutex<Vec<Row>>,
    batches: AtomicUsize,
}

impl MemorySink {
    pub fn new(columns: ColumnRegistry) -> Self {
        Self {
            columns,
            rows: Mutex::new(Vec::new()),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    /// Drop all rows, as before a full reload
    pub fn truncate(&self) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.clear();
        }
        self.batches.store(0, Ordering::Relaxed);
    }
}

#[async_trait]
impl RowSink for MemorySink {
    async fn insert_batch(&self, rows: &[Row], _batch_size_hint: usize) -> Result<(), SinkError> {
        let mut stored = self
            .rows
            .lock()
            .map_err(|_| SinkError::Rejected("row store lock poisoned".to_string()))?;
        stored.extend_from_slice(rows);
        self.batches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }
}

/// Writes the storage representation of each row as one JSON object per line
pub struct JsonLinesSink {
    columns: ColumnRegistry,
    writer: AsyncMutex<BufWriter<tokio::fs::File>>,
}

impl JsonLinesSink {
    pub async fn create(path: impl AsRef<Path>, columns: ColumnRegistry) -> Result<Self, SinkError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::File::create(path).await?;
        Ok(Self {
            columns,
            writer: AsyncMutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl RowSink for JsonLinesSink {
    async fn insert_batch(&self, rows: &[Row], _batch_size_hint: usize) -> Result<(), SinkError> {
        let mut buffer = Vec::new();
        for row in rows {
            let object = row.to_storage(&self.columns)?;
            serde_json::to_writer(&mut buffer, &object)?;
            buffer.push(b'\n');
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(&buffer).await?;
        Ok(())
    }

    fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::{ColumnSpec, ColumnType, NativeValue};

    fn registry() -> ColumnRegistry {
        ColumnRegistry::from_specs(vec![("n", ColumnSpec::new(ColumnType::UInt8))]).unwrap()
    }

    fn row(n: i64) -> Row {
        let mut row = Row::default();
        row.push("n", NativeValue::Int(n));
        row
    }

    #[tokio::test]
    async fn test_memory_sink_truncate() {
        let sink = MemorySink::new(registry());
        sink.insert_batch(&[row(1), row(2)], 2).await.unwrap();
        sink.insert_batch(&[row(3)], 2).await.unwrap();
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.batches(), 2);

        sink.truncate();
        assert!(sink.is_empty());
        assert_eq!(sink.batches(), 0);
    }

    #[tokio::test]
    async fn test_json_lines_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/rows.ndjson");

        let sink = JsonLinesSink::create(&path, registry()).await.unwrap();
        sink.insert_batch(&[row(1), row(2)], 2).await.unwrap();
        sink.flush().await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "{\"n\":1}\n{\"n\":2}\n");
    }
}
