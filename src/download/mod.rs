//! HTTP transfer primitive for recording pages and assets.
//!
//! This module provides the single network primitive the pipeline builds on:
//! one GET, streamed to a staging file, with the response shape validated
//! before anything is written.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for multi-gigabyte videos)
//! - HTML-disguised-as-binary detection and ZIP signature validation
//! - Minimum size check for video renditions
//! - Byte-level progress reporting
//! - Cooperative cancellation through [`tokio_util::sync::CancellationToken`]
//! - Configurable timeouts (30s connect, 5min read by default)
//!
//! # Example
//!
//! ```no_run
//! use connectdl_core::download::{HttpClient, TransferKind, TransferRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let request = TransferRequest::new(
//!     "https://meet.example.edu/p1abc/output/p1abc.zip?download=zip",
//!     "./.p1abc_temp.zip",
//!     TransferKind::Archive,
//! );
//! let bytes = client.transfer(&request, &CancellationToken::new(), None).await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod transfer;

pub use client::{HttpClient, PageResponse};
pub use error::{ErrorKind, TransferError};
pub use transfer::{ProgressCallback, TransferKind, TransferRequest};
