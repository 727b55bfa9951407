//! Streaming download of the source resource

use crate::error::FetchError;
use chunkload_common::progress::{create_download_progress, format_bytes};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

/// Options for a single download
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Request timeout; `None` keeps the reqwest default (no timeout)
    pub timeout: Option<Duration>,
    pub show_progress: bool,
}

/// Outcome of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Download `url` into `dest`, streaming the body to disk
///
/// Any existing file at `dest` is truncated. No retry and no resume: a
/// failure leaves a partial file that the next run overwrites.
pub async fn download(
    url: &str,
    dest: impl AsRef<Path>,
    options: &FetchOptions,
) -> Result<FetchSummary, FetchError> {
    let dest = dest.as_ref();
    info!(url, dest = %dest.display(), "Downloading source");

    let result = stream_to_file(url, dest, options).await;
    match &result {
        Ok(summary) => info!(bytes = summary.bytes, "Download complete ({})", format_bytes(summary.bytes)),
        Err(e) => error!(url, error = %e, "Download failed"),
    }
    result
}

async fn stream_to_file(
    url: &str,
    dest: &Path,
    options: &FetchOptions,
) -> Result<FetchSummary, FetchError> {
    let mut builder = reqwest::Client::builder().user_agent(concat!("chunkload/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build()?;

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let to_write_error = |source: std::io::Error| FetchError::Write {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_write_error)?;
    }

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dest.display().to_string());
    let pb = create_download_progress(
        response.content_length(),
        &format!("Downloading {}", file_name),
        options.show_progress,
    );

    let mut file = tokio::fs::File::create(dest).await.map_err(to_write_error)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(to_write_error)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush().await.map_err(to_write_error)?;
    pb.finish_and_clear();

    Ok(FetchSummary {
        path: dest.to_path_buf(),
        bytes: downloaded,
    })
}
