use crate::transform::{ErrorCode, ValidationError};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Validation errors of one ingestion run, grouped by column and error code
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorLog {
    columns: BTreeMap<String, BTreeMap<ErrorCode, Vec<ValidationError>>>,
}

/// Error count for one `(column, code)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    pub column: String,
    pub code: ErrorCode,
    pub count: usize,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, column: &str, error: ValidationError) {
        self.columns
            .entry(column.to_string())
            .or_default()
            .entry(error.code)
            .or_default()
            .push(error);
    }

    /// Append every error of `other`
    pub fn merge(&mut self, other: ErrorLog) {
        for (column, codes) in other.columns {
            let target = self.columns.entry(column).or_default();
            for (code, errors) in codes {
                target.entry(code).or_default().extend(errors);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Total number of recorded errors
    pub fn count(&self) -> usize {
        self.columns
            .values()
            .flat_map(|codes| codes.values())
            .map(Vec::len)
            .sum()
    }

    pub fn errors(&self, column: &str, code: ErrorCode) -> &[ValidationError] {
        self.columns
            .get(column)
            .and_then(|codes| codes.get(&code))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn summary(&self) -> Vec<ErrorSummary> {
        self.columns
            .iter()
            .flat_map(|(column, codes)| {
                codes.iter().map(move |(code, errors)| ErrorSummary {
                    column: column.clone(),
                    code: *code,
                    count: errors.len(),
                })
            })
            .collect()
    }

    /// Log one event per column and code
    pub fn log_summary(&self) {
        if self.is_empty() {
            info!("No validation errors");
            return;
        }
        for entry in self.summary() {
            let sample = self
                .errors(&entry.column, entry.code)
                .first()
                .map(|e| e.value.as_str())
                .unwrap_or_default();
            warn!(
                column = %entry.column,
                code = %entry.code,
                count = entry.count,
                sample = %sample,
                "Validation errors"
            );
        }
    }
}
