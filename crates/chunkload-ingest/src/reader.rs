//! Streaming reader for gzip-compressed CSV files
//!
//! [`ChunkReader`] decompresses and parses the source lazily, yielding
//! [`Batch`]es of at most `batch_size` rows. Only one batch is held in memory
//! at a time. The reader is forward-only: reprocessing the file requires a
//! new [`ChunkReader::open`].

use crate::batch::{Batch, Value};
use crate::error::ReadError;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, error};

/// Upper bound on rows pre-allocated per batch, independent of `batch_size`
const MAX_PREALLOCATED_ROWS: usize = 16_384;

/// Lazy, finite sequence of row batches read from a compressed CSV source
pub struct ChunkReader<R: Read> {
    reader: csv::Reader<MultiGzDecoder<BufReader<R>>>,
    columns: Vec<String>,
    batch_size: usize,
    record: csv::ByteRecord,
    finished: bool,
}

impl ChunkReader<File> {
    /// Open a gzip-compressed CSV file
    ///
    /// Reads the header row eagerly so that a missing, unreadable or corrupt
    /// file fails here rather than on the first batch.
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| {
            error!(path = %path.display(), error = %source, "Failed to open source file");
            ReadError::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;

        debug!(path = %path.display(), batch_size, "Opened source file");
        Self::from_reader(file, batch_size)
    }
}

impl<R: Read> ChunkReader<R> {
    /// Wrap any reader producing gzip-compressed CSV bytes
    pub fn from_reader(inner: R, batch_size: usize) -> Result<Self, ReadError> {
        let decoder = MultiGzDecoder::new(BufReader::new(inner));
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(decoder);

        let header = reader.byte_headers().map_err(|e| {
            let err = ReadError::from(e);
            error!(error = %err, "Failed to read CSV header");
            err
        })?;

        if header.is_empty() {
            error!("Source has no header row");
            return Err(ReadError::MissingHeader);
        }

        let columns = header
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let name = String::from_utf8_lossy(field);
                if name.is_empty() {
                    format!("Unnamed: {}", index)
                } else {
                    name.into_owned()
                }
            })
            .collect::<Vec<_>>();

        debug!(columns = columns.len(), "Parsed CSV header");

        Ok(Self {
            reader,
            columns,
            batch_size: batch_size.max(1),
            record: csv::ByteRecord::new(),
            finished: false,
        })
    }

    /// Column names from the header row, as they appear in the source
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn read_batch(&mut self) -> Result<Option<Batch>, ReadError> {
        let width = self.columns.len();
        let mut rows = Vec::with_capacity(self.batch_size.min(MAX_PREALLOCATED_ROWS));

        while rows.len() < self.batch_size {
            if !self.reader.read_byte_record(&mut self.record)? {
                self.finished = true;
                break;
            }

            if self.record.len() > width {
                return Err(ReadError::RowTooLong {
                    line: self.record.position().map(|p| p.line()).unwrap_or_default(),
                    expected: width,
                    found: self.record.len(),
                });
            }

            let row = self
                .record
                .iter()
                .map(|field| Value::parse(&String::from_utf8_lossy(field)))
                .collect::<Vec<_>>();
            rows.push(row);
        }

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(Batch::new(self.columns.clone(), rows)))
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Batch, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(e) => {
                error!(error = %e, "Failed to read batch");
                self.finished = true;
                Some(Err(e))
            },
        }
    }
}
