//! Validating streaming transfer of one response body to disk.
//!
//! The first [`HEAD_BYTES`] of every body are held in memory and classified
//! before any file is created, so an HTML error page served with status 200
//! never lands on disk as `recording.mp4` or `raw.zip`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::constants::{HEAD_BYTES, MIN_VIDEO_BYTES, WRITE_BUFFER_BYTES, ZIP_SIGNATURE};
use super::error::TransferError;
use crate::recording::CookieSet;

/// Byte-level progress callback: `(downloaded, total)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// How a response body is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Any non-HTML body (documents, captions).
    Binary,
    /// Must start with the ZIP local file signature.
    Archive,
    /// Must not be HTML and must reach the minimum video size.
    Video,
}

impl TransferKind {
    pub(crate) fn wants_media_accept(self) -> bool {
        matches!(self, Self::Binary | Self::Video)
    }
}

/// One GET-to-file transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source URL.
    pub url: String,
    /// Destination file; parent directories are created on demand.
    pub destination: PathBuf,
    /// Validation applied to the body.
    pub kind: TransferKind,
    /// Cookies sent with the request.
    pub cookies: CookieSet,
    /// `Referer` header value.
    pub referer: Option<String>,
}

impl TransferRequest {
    /// Creates a request with no cookies or referer.
    #[must_use]
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>, kind: TransferKind) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            kind,
            cookies: CookieSet::new(),
            referer: None,
        }
    }

    /// Sets the request cookies.
    #[must_use]
    pub fn with_cookies(mut self, cookies: CookieSet) -> Self {
        self.cookies = cookies;
        self
    }

    /// Sets the `Referer` header.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// Looks like an HTML page: declared as such, or the first non-space byte is `<`.
pub(crate) fn looks_like_html(content_type: Option<&str>, head: &[u8]) -> bool {
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html")) {
        return true;
    }
    head.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'<')
}

/// Checks the ZIP local file header signature.
pub(crate) fn has_zip_signature(head: &[u8]) -> bool {
    head.starts_with(ZIP_SIGNATURE)
}

fn classify_head(
    kind: TransferKind,
    url: &str,
    content_type: Option<&str>,
    head: &[u8],
) -> Result<(), TransferError> {
    let window = &head[..head.len().min(HEAD_BYTES)];
    if looks_like_html(content_type, window) {
        debug!("response looks like an HTML page");
        return Err(TransferError::not_found(url));
    }
    if kind == TransferKind::Archive && !has_zip_signature(window) {
        return Err(TransferError::invalid_content(url));
    }
    Ok(())
}

/// Streams a successful response into `request.destination` after validating its head.
pub(crate) async fn stream_validated(
    response: reqwest::Response,
    request: &TransferRequest,
    progress: Option<&ProgressCallback>,
) -> Result<u64, TransferError> {
    let url = request.url.as_str();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if request.kind == TransferKind::Video
        && content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    {
        return Err(TransferError::wrong_content(
            url,
            "returned HTML instead of video",
        ));
    }

    let total = response.content_length();
    let mut stream = response.bytes_stream();

    let mut head: Vec<u8> = Vec::with_capacity(HEAD_BYTES);
    while head.len() < HEAD_BYTES {
        match stream.next().await {
            Some(chunk) => {
                let chunk = chunk.map_err(|e| TransferError::network(url, e))?;
                head.extend_from_slice(&chunk);
            }
            None => break,
        }
    }
    classify_head(request.kind, url, content_type.as_deref(), &head)?;

    let path = request.destination.as_path();
    create_parent_dirs(path).await?;
    let file = File::create(path)
        .await
        .map_err(|e| TransferError::io(path, e))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);

    writer
        .write_all(&head)
        .await
        .map_err(|e| TransferError::io(path, e))?;
    let mut written = head.len() as u64;
    let report = |done: u64| {
        if let (Some(callback), Some(total)) = (progress, total) {
            callback(done, total);
        }
    };
    report(written);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransferError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| TransferError::io(path, e))?;
        written += chunk.len() as u64;
        report(written);
    }

    writer
        .flush()
        .await
        .map_err(|e| TransferError::io(path, e))?;

    if request.kind == TransferKind::Video && written < MIN_VIDEO_BYTES {
        return Err(TransferError::wrong_content(
            url,
            format!("file too small ({written} bytes), likely an error page"),
        ));
    }

    info!(path = %path.display(), bytes = written, "download complete");
    Ok(written)
}

async fn create_parent_dirs(path: &Path) -> Result<(), TransferError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TransferError::io(parent, e))?;
    }
    Ok(())
}
