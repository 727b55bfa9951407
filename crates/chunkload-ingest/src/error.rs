//! Error types for the ingest pipeline
//!
//! One enum per stage, wrapped by [`PipelineError`] which records the batch
//! being processed and the last batch that was committed before the failure.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure retrieving the source resource
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download of {url} failed with HTTP status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure opening, decompressing or parsing the source stream
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decompress source: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[source] csv::Error),

    #[error("Source has no header row")]
    MissingHeader,

    #[error("Line {line} has {found} fields, header defines {expected}")]
    RowTooLong {
        line: u64,
        expected: usize,
        found: usize,
    },
}

impl From<csv::Error> for ReadError {
    fn from(err: csv::Error) -> Self {
        // Decompression failures surface through the csv reader as I/O errors
        if !err.is_io_error() {
            return ReadError::Csv(err);
        }

        match err.into_kind() {
            csv::ErrorKind::Io(io) => ReadError::Decompress(io),
            kind => ReadError::Decompress(std::io::Error::other(format!("{:?}", kind))),
        }
    }
}

/// Structurally invalid batch
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    #[error("Batch has no columns")]
    NoColumns,

    #[error("Columns '{first}' and '{second}' both normalize to '{normalized}'")]
    DuplicateColumn {
        normalized: String,
        first: String,
        second: String,
    },
}

/// Failure persisting the schema document
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to write schema document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Store-level failure writing a batch
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Table '{0}' does not exist; the first batch must be loaded before appending")]
    MissingTable(String),

    #[error("Column mismatch for table '{table}': table has {expected:?}, batch has {found:?}")]
    ColumnMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Batch has no columns to load")]
    EmptyLayout,
}

/// Top-level failure of a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to open target store {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error("Read failed at batch {batch} (last committed: {}): {source}", fmt_committed(.last_committed))]
    Read {
        batch: usize,
        last_committed: Option<usize>,
        #[source]
        source: ReadError,
    },

    #[error("Transform failed at batch {batch} (last committed: {}): {source}", fmt_committed(.last_committed))]
    Transform {
        batch: usize,
        last_committed: Option<usize>,
        #[source]
        source: TransformError,
    },

    #[error("Schema generation failed: {0}")]
    Schema(#[from] SchemaError),

    #[error("Load failed at batch {batch} (last committed: {}): {source}", fmt_committed(.last_committed))]
    Load {
        batch: usize,
        last_committed: Option<usize>,
        #[source]
        source: LoadError,
    },
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Index of the last batch whose rows are committed in the target table
    pub fn last_committed(&self) -> Option<usize> {
        match self {
            Self::Read { last_committed, .. }
            | Self::Transform { last_committed, .. }
            | Self::Load { last_committed, .. } => *last_committed,
            _ => None,
        }
    }
}

fn fmt_committed(last_committed: &Option<usize>) -> String {
    match last_committed {
        Some(index) => format!("batch {}", index),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_reports_last_committed_batch() {
        let err = PipelineError::Load {
            batch: 2,
            last_committed: Some(1),
            source: LoadError::MissingTable("processed_data".to_string()),
        };

        assert_eq!(err.last_committed(), Some(1));
        let message = err.to_string();
        assert!(message.contains("batch 2"));
        assert!(message.contains("last committed: batch 1"));
    }

    #[test]
    fn test_first_batch_failure_has_nothing_committed() {
        let err = PipelineError::Transform {
            batch: 0,
            last_committed: None,
            source: TransformError::NoColumns,
        };

        assert_eq!(err.last_committed(), None);
        assert!(err.to_string().contains("last committed: none"));
    }
}
