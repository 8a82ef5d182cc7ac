//! Constants for the download module (timeouts, buffer sizes, validation thresholds).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes between body reads for large videos).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Idle keep-alive connections kept per host.
pub const MAX_IDLE_PER_HOST: usize = 20;

/// How long an idle pooled connection is kept.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Bytes read into memory before a response is committed to disk.
pub const HEAD_BYTES: usize = 4096;

/// Smallest body accepted as a real video rendition.
pub const MIN_VIDEO_BYTES: u64 = 1024;

/// Buffered writer capacity for streamed bodies.
pub const WRITE_BUFFER_BYTES: usize = 64 * 1024;

/// Cap on the recording page body.
pub const PAGE_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// ZIP local file header signature.
pub const ZIP_SIGNATURE: &[u8; 4] = b"PK\x03\x04";
