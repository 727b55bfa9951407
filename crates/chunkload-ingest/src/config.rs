//! Pipeline configuration
//!
//! Defaults point at the Tyroo sample dataset and local `data.db`; every
//! value can be overridden through `CHUNKLOAD_*` environment variables (a `.env`
//! file is honored) and then through CLI flags.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default remote location of the compressed CSV dataset.
pub const DEFAULT_SOURCE_URL: &str =
    "https://tyroo-engineering-assesments.s3.us-west-2.amazonaws.com/Tyroo-dummy-data.csv.gz";

/// Default local path the download is saved to.
pub const DEFAULT_SOURCE_FILE: &str = "Tyroo-dummy-data.csv.gz";

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Default SQLite database file.
pub const DEFAULT_DB_PATH: &str = "data.db";

/// Default location of the generated schema document.
pub const DEFAULT_SCHEMA_PATH: &str = "schema.sql";

/// Default destination table.
pub const DEFAULT_TABLE_NAME: &str = "processed_data";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows per load unit
    pub batch_size: usize,

    /// Remote resource to download
    pub source_url: String,

    /// Local file the download is written to and read from
    pub source_file: PathBuf,

    /// SQLite database file
    pub db_path: PathBuf,

    /// Schema document output path
    pub schema_path: PathBuf,

    /// Destination table identifier
    pub table_name: String,

    /// Optional HTTP timeout; `None` leaves the transport default in place
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,

    /// Draw progress bars on the terminal
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            source_file: PathBuf::from(DEFAULT_SOURCE_FILE),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            http_timeout_secs: None,
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment and defaults
    ///
    /// Environment variables:
    /// - `CHUNKLOAD_BATCH_SIZE`
    /// - `CHUNKLOAD_SOURCE_URL`
    /// - `CHUNKLOAD_SOURCE_FILE`
    /// - `CHUNKLOAD_DB_PATH`
    /// - `CHUNKLOAD_SCHEMA_PATH`
    /// - `CHUNKLOAD_TABLE_NAME`
    /// - `CHUNKLOAD_HTTP_TIMEOUT_SECS`
    /// - `CHUNKLOAD_SHOW_PROGRESS` (true/false)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(size) = std::env::var("CHUNKLOAD_BATCH_SIZE") {
            config.batch_size = size.parse().map_err(|_| {
                PipelineError::config(format!("CHUNKLOAD_BATCH_SIZE is not a number: {}", size))
            })?;
        }

        if let Ok(url) = std::env::var("CHUNKLOAD_SOURCE_URL") {
            config.source_url = url;
        }

        if let Ok(path) = std::env::var("CHUNKLOAD_SOURCE_FILE") {
            config.source_file = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("CHUNKLOAD_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("CHUNKLOAD_SCHEMA_PATH") {
            config.schema_path = PathBuf::from(path);
        }

        if let Ok(table) = std::env::var("CHUNKLOAD_TABLE_NAME") {
            config.table_name = table;
        }

        config.http_timeout_secs = std::env::var("CHUNKLOAD_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok());

        if let Ok(val) = std::env::var("CHUNKLOAD_SHOW_PROGRESS") {
            config.show_progress = val.parse().unwrap_or(true);
        }

        config.validate()?;
        Ok(config)
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be greater than 0"));
        }

        if self.source_url.trim().is_empty() {
            return Err(PipelineError::config("source_url cannot be empty"));
        }

        if self.table_name.trim().is_empty() {
            return Err(PipelineError::config("table_name cannot be empty"));
        }

        for (name, path) in [
            ("source_file", &self.source_file),
            ("db_path", &self.db_path),
            ("schema_path", &self.schema_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(PipelineError::config(format!("{} cannot be empty", name)));
            }
        }

        Ok(())
    }

    /// HTTP timeout as Duration, if one is configured
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.config.source_url = url.into();
        self
    }

    pub fn source_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source_file = path.into();
        self
    }

    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.schema_path = path.into();
        self
    }

    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.config.table_name = table.into();
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = Some(secs);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
