//! Error types for the download module.
//!
//! Every transfer failure is classified into an [`ErrorKind`] so the
//! orchestrator can turn asset-level failures into warnings without string
//! matching.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification shared by transfer, job and recording errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Resource missing (404 or an HTML error page in place of a file).
    NotFound,
    /// Body does not carry the expected signature (archive).
    InvalidContent,
    /// Body has the wrong media type or is too small to be real (video).
    WrongContent,
    /// HTTP 403 on an asset; the signed link expired or was already used.
    Forbidden,
    /// The recording page requires a session token.
    AuthRequired,
    /// The output directory already holds files.
    AlreadyExists,
    /// Network, HTTP status, or local I/O failure.
    Transport,
    /// Neither the video nor the archive could be obtained.
    EmptyResult,
    /// The operation was cancelled.
    Cancelled,
}

/// Errors that can occur while transferring one resource.
#[derive(Debug, Error)]
pub enum TransferError {
    /// HTTP 404, or the server answered with an HTML page.
    #[error("resource not found: {url}")]
    NotFound {
        /// The requested URL.
        url: String,
    },

    /// The body failed signature validation.
    #[error("response from {url} is not a valid ZIP archive")]
    InvalidContent {
        /// The requested URL.
        url: String,
    },

    /// The body is not the expected media.
    #[error("unexpected content from {url}: {reason}")]
    WrongContent {
        /// The requested URL.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// HTTP 403 on an asset download.
    #[error("HTTP 403 downloading {url} (token may be expired or already used)")]
    Forbidden {
        /// The requested URL.
        url: String,
    },

    /// The recording page rejected the request for lack of a valid session.
    #[error("[AUTH] authentication required (HTTP {status}) fetching {url}")]
    AuthRequired {
        /// The page URL.
        url: String,
        /// Status that triggered the classification (401, 403 or 500).
        status: u16,
    },

    /// Any other non-success status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The requested URL.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The requested URL.
        url: String,
    },

    /// File system error while staging the body.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL could not be turned into a request.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The job's cancellation token fired.
    #[error("download cancelled: {url}")]
    Cancelled {
        /// The requested URL.
        url: String,
    },
}

impl TransferError {
    /// Creates a network error, promoting reqwest timeouts to [`TransferError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }

    /// Creates an invalid-archive error.
    pub fn invalid_content(url: impl Into<String>) -> Self {
        Self::InvalidContent { url: url.into() }
    }

    /// Creates a wrong-content error.
    pub fn wrong_content(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WrongContent {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidContent { .. } => ErrorKind::InvalidContent,
            Self::WrongContent { .. } => ErrorKind::WrongContent,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::AuthRequired { .. } => ErrorKind::AuthRequired,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::HttpStatus { .. }
            | Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Io { .. }
            | Self::InvalidUrl { .. } => ErrorKind::Transport,
        }
    }
}
