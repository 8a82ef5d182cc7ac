//! connectdl Core Library
//!
//! This library provides the acquisition pipeline behind the `connectdl`
//! tool: it takes a web-conference recording URL and assembles the video
//! rendition, the raw session archive, captions, a transcript, the chat log
//! and all shared documents into one output directory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`recording`] - Recording URL decomposition, session token, cookies, titles
//! - [`download`] - HTTP client and the validating streaming transfer primitive
//! - [`pool`] - Bounded worker pool shared by every in-flight recording
//! - [`extract`] - Recording archive extraction
//! - [`metadata`] - Page and archive metadata extraction
//! - [`captions`] - Caption cleaning, transcript, chat log and document index
//! - [`mux`] - Subtitle embedding through MP4Box
//! - [`orchestrator`] - Per-recording pipeline state machine
//! - [`batch`] - Multi-recording coordination and run summary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod captions;
pub mod download;
pub mod extract;
pub mod metadata;
pub mod mux;
pub mod orchestrator;
pub mod pool;
pub mod recording;
mod user_agent;

// Re-export commonly used types
pub use batch::{
    BatchCoordinator, BatchObserver, BatchOptions, BatchSummary, OverwritePrompt, dedupe_urls,
};
pub use download::{
    ErrorKind, HttpClient, PageResponse, ProgressCallback, TransferError, TransferKind,
    TransferRequest,
};
pub use metadata::{
    ArchiveInsights, ConnectExtractor, DocumentLink, MetadataExtractor, PageMetadata,
};
pub use mux::{Mp4BoxEmbedder, MuxError, SubtitleEmbedder};
pub use orchestrator::{Downloader, RecordingError, RecordingOptions, RecordingResult};
pub use pool::{DownloadJob, JobError, JobKind, PoolConfig, PoolError, PoolStats, WorkerPool};
pub use recording::{CookieSet, RecordingRef, Session, sanitize_title};
