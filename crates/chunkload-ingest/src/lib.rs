//! chunkload Ingest Library
//!
//! Streams a gzip-compressed CSV file into a SQLite table in fixed-size
//! batches and writes a companion `schema.sql` describing the inferred column
//! types.
//!
//! # Pipeline
//!
//! - [`fetch`]: download the source file
//! - [`reader`]: decompress and split the CSV into batches
//! - [`transform`]: normalize column names and missing values
//! - [`schema`]: infer column types from the first batch and export them
//! - [`loader`]: replace the table on the first batch, append afterwards
//! - [`pipeline`]: drive the stages in order
//!
//! # Example
//!
//! ```no_run
//! use chunkload_ingest::{config::PipelineConfig, pipeline::Pipeline};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::builder()
//!         .source_file("data.csv.gz")
//!         .batch_size(50_000)
//!         .build()?;
//!
//!     let summary = Pipeline::new(config).run().await?;
//!     println!("loaded {} rows", summary.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod transform;

pub use batch::{Batch, Value};
pub use error::{FetchError, LoadError, PipelineError, ReadError, Result, SchemaError, TransformError};
