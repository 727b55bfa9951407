//! chunkload - download a compressed CSV and load it into SQLite

use anyhow::Result;
use chunkload_common::logging::{init_logging, LogConfig, LogLevel};
use chunkload_ingest::config::PipelineConfig;
use chunkload_ingest::fetch::{self, FetchOptions};
use chunkload_ingest::pipeline::{Pipeline, RunSummary};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "chunkload")]
#[command(author, version, about = "Load a gzip-compressed CSV into a SQLite table in batches")]
struct Cli {
    /// Remote gzip CSV to download
    #[arg(long)]
    source_url: Option<String>,

    /// Local path the download is saved to and read from
    #[arg(long)]
    source_file: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Where to write the generated schema document
    #[arg(long)]
    schema_path: Option<PathBuf>,

    /// Destination table
    #[arg(long)]
    table_name: Option<String>,

    /// Rows per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// HTTP timeout in seconds for the download
    #[arg(long)]
    http_timeout_secs: Option<u64>,

    /// Reuse the local source file if it already exists
    #[arg(long)]
    skip_download: bool,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply CLI flags on top of the environment configuration
    fn apply(&self, mut config: PipelineConfig) -> Result<PipelineConfig> {
        if let Some(ref url) = self.source_url {
            config.source_url = url.clone();
        }
        if let Some(ref path) = self.source_file {
            config.source_file = path.clone();
        }
        if let Some(ref path) = self.db_path {
            config.db_path = path.clone();
        }
        if let Some(ref path) = self.schema_path {
            config.schema_path = path.clone();
        }
        if let Some(ref table) = self.table_name {
            config.table_name = table.clone();
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(secs) = self.http_timeout_secs {
            config.http_timeout_secs = Some(secs);
        }
        if self.no_progress {
            config.show_progress = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("process")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match run(&cli).await {
        Ok(summary) => {
            info!(
                batches = summary.batches,
                rows_loaded = summary.rows_loaded,
                "Ingestion complete"
            );
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            error!("FATAL: run aborted: {:#}", e);
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn run(cli: &Cli) -> Result<RunSummary> {
    let config = cli.apply(PipelineConfig::from_env()?)?;
    debug!(config = %serde_json::to_string(&config)?, "Effective configuration");

    let cached = config.source_file.exists();
    if cli.skip_download && cached {
        info!(path = %config.source_file.display(), "Using cached source file");
    } else {
        if cli.skip_download {
            warn!(path = %config.source_file.display(), "No cached source file, downloading");
        }

        let options = FetchOptions {
            timeout: config.http_timeout(),
            show_progress: config.show_progress,
        };
        fetch::download(&config.source_url, &config.source_file, &options).await?;
    }

    let summary = Pipeline::new(config).run().await?;
    Ok(summary)
}
