//! Pipeline driver
//!
//! Sequences the stages for one run: read a batch, clean it, write the schema
//! document (first batch only), load it, repeat. Strictly sequential; the
//! first failure ends the run. Batches committed before the failure stay in
//! the table and the error names the last one.

use crate::batch::Batch;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::loader::{BatchSink, SqliteLoader};
use crate::reader::ChunkReader;
use crate::schema::{write_schema_document, TableSchema};
use crate::transform;
use chunkload_common::progress::create_batch_progress;
use indicatif::ProgressBar;
use std::io::Read;
use tracing::{error, info, warn};

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    /// Processing the batch with this index
    Running { batch: usize },
    Done,
    Failed { last_committed: Option<usize> },
}

/// Counters for a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches read from the source
    pub batches: usize,
    /// Rows read from the source
    pub rows_read: u64,
    /// Rows written to the target table
    pub rows_loaded: u64,
    /// Rows removed because every field was empty
    pub rows_dropped: u64,
    /// Schema inferred from the first batch; `None` if the source had no rows
    pub schema: Option<TableSchema>,
}

/// Single-pass driver for one run
pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: PipelineState::NotStarted,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Run against the configured SQLite database
    ///
    /// The configuration is validated and the source opened before the
    /// database is touched. The connection is closed before returning,
    /// whether the run succeeded or not.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let reader = self.start()?;

        let db_path = self.config.db_path.clone();
        let mut loader = match SqliteLoader::connect(&db_path, self.config.table_name.clone()).await {
            Ok(loader) => loader,
            Err(source) => {
                let err = PipelineError::Store {
                    path: db_path,
                    source,
                };
                self.fail(&err);
                return Err(err);
            },
        };

        let result = self.finish(reader, &mut loader).await;
        loader.close().await;
        result
    }

    /// Run against any sink, reading the configured source file
    pub async fn run_with_sink<S: BatchSink>(&mut self, sink: &mut S) -> Result<RunSummary> {
        let reader = self.start()?;
        self.finish(reader, sink).await
    }

    /// Check the run can begin, then open the source
    fn start(&mut self) -> Result<ChunkReader<std::fs::File>> {
        if self.state != PipelineState::NotStarted {
            return Err(PipelineError::config("pipeline has already been run"));
        }

        self.open_source().inspect_err(|e| self.fail(e))
    }

    fn open_source(&mut self) -> Result<ChunkReader<std::fs::File>> {
        self.config.validate()?;
        self.state = PipelineState::Running { batch: 0 };

        let path = &self.config.source_file;
        info!(path = %path.display(), batch_size = self.config.batch_size, "Processing file");

        ChunkReader::open(path, self.config.batch_size).map_err(|source| PipelineError::Read {
            batch: 0,
            last_committed: None,
            source,
        })
    }

    async fn finish<R: Read, S: BatchSink>(
        &mut self,
        reader: ChunkReader<R>,
        sink: &mut S,
    ) -> Result<RunSummary> {
        let result = self.drive(reader, sink).await;

        match &result {
            Ok(summary) => {
                self.state = PipelineState::Done;
                info!(
                    batches = summary.batches,
                    rows_loaded = summary.rows_loaded,
                    rows_dropped = summary.rows_dropped,
                    "Processing complete"
                );
            },
            Err(e) => self.fail(e),
        }

        result
    }

    fn fail(&mut self, err: &PipelineError) {
        self.state = PipelineState::Failed {
            last_committed: err.last_committed(),
        };
        error!(error = %err, "Processing failed");
    }

    async fn drive<R: Read, S: BatchSink>(
        &mut self,
        reader: ChunkReader<R>,
        sink: &mut S,
    ) -> Result<RunSummary> {
        let pb = create_batch_progress("Processing chunks", self.config.show_progress);
        let mut summary = RunSummary::default();

        let outcome = self.process_batches(reader, sink, &pb, &mut summary).await;
        match outcome {
            Ok(()) => pb.finish_and_clear(),
            Err(_) => pb.abandon(),
        }
        outcome?;

        if summary.batches == 0 {
            warn!("Source contained no data rows; nothing was loaded");
        }

        Ok(summary)
    }

    async fn process_batches<R: Read, S: BatchSink>(
        &mut self,
        reader: ChunkReader<R>,
        sink: &mut S,
        pb: &ProgressBar,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut last_committed: Option<usize> = None;

        for (index, chunk) in reader.enumerate() {
            self.state = PipelineState::Running { batch: index };

            let chunk = chunk.map_err(|source| PipelineError::Read {
                batch: index,
                last_committed,
                source,
            })?;
            let read = chunk.len() as u64;

            let cleaned = transform::clean(chunk).map_err(|source| PipelineError::Transform {
                batch: index,
                last_committed,
                source,
            })?;
            let dropped = read - cleaned.len() as u64;

            if index == 0 {
                summary.schema = Some(self.export_schema(&cleaned).await?);
            }

            let loaded = sink
                .write_batch(&cleaned, index)
                .await
                .map_err(|source| PipelineError::Load {
                    batch: index,
                    last_committed,
                    source,
                })?;
            last_committed = Some(index);

            summary.batches += 1;
            summary.rows_read += read;
            summary.rows_dropped += dropped;
            summary.rows_loaded += loaded;

            info!(batch = index, rows_read = read, rows_loaded = loaded, rows_dropped = dropped, "Loaded batch");
            pb.inc(1);
            pb.set_prefix(format!("{} rows", summary.rows_loaded));
        }

        Ok(())
    }

    async fn export_schema(&self, first: &Batch) -> Result<TableSchema> {
        let schema = TableSchema::infer(&self.config.table_name, first);
        write_schema_document(&schema, &self.config.schema_path).await?;
        Ok(schema)
    }
}
