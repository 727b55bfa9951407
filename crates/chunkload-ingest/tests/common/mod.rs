//! Shared fixtures for ingest integration tests

#![allow(dead_code)]

use chunkload_ingest::config::PipelineConfig;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Gzip `contents` into `path`
pub fn write_gz(path: &Path, contents: &str) {
    let file = std::fs::File::create(path).expect("Failed to create fixture file");
    let mut encoder = GzEncoder::new(file, Compression::fast());
    encoder
        .write_all(contents.as_bytes())
        .expect("Failed to write fixture");
    encoder.finish().expect("Failed to finish gzip stream");
}

/// CSV with a messy header and `rows` generated data rows
pub fn generated_csv(rows: usize) -> String {
    let mut csv = String::from(" Row ID ,Campaign Name,Click Rate,Is Active\n");
    for i in 0..rows {
        csv.push_str(&format!("{},campaign {},{}.5,{}\n", i, i % 7, i % 3, i % 2 == 0));
    }
    csv
}

/// Temporary workspace holding the source file, database and schema document
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn source(&self) -> PathBuf {
        self.dir.path().join("source.csv.gz")
    }

    pub fn db(&self) -> PathBuf {
        self.dir.path().join("data.db")
    }

    pub fn schema(&self) -> PathBuf {
        self.dir.path().join("schema.sql")
    }

    /// Write `csv` as the gzip source
    pub fn with_source(self, csv: &str) -> Self {
        write_gz(&self.source(), csv);
        self
    }

    pub fn config(&self, batch_size: usize) -> PipelineConfig {
        PipelineConfig::builder()
            .source_file(self.source())
            .db_path(self.db())
            .schema_path(self.schema())
            .batch_size(batch_size)
            .show_progress(false)
            .build()
            .expect("Invalid test configuration")
    }
}
