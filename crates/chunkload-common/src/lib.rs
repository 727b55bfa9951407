//! chunkload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the chunkload workspace members:
//!
//! - **Logging**: console/file `tracing` setup driven by `LogConfig`
//! - **Progress**: `indicatif` bars for downloads and batch processing
//!
//! # Example
//!
//! ```no_run
//! use chunkload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod progress;
