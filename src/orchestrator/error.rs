//! Terminal errors of a single recording download.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::download::{ErrorKind, TransferError};
use crate::recording::RecordingUrlError;

/// How to obtain a session token, appended to authentication failures.
pub const SESSION_TOKEN_GUIDANCE: &str = "\
To access private recordings, include a session token in the URL or pass --session.
Example: https://your-domain.adobeconnect.com/recording-id/?session=YOUR_SESSION_TOKEN

To get a session token:
1. Log in to Adobe Connect in your browser
2. Open the recording page
3. Copy the URL from the address bar (it should contain ?session=...)
4. Use that complete URL with this tool";

/// Errors that end a recording download.
///
/// Asset-level failures (missing archive, missing video, failed documents)
/// never appear here; they become warnings on the result.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// The recording URL could not be decomposed.
    #[error(transparent)]
    InvalidUrl(#[from] RecordingUrlError),

    /// The recording page requires a session token.
    #[error("{source}\n\n{SESSION_TOKEN_GUIDANCE}")]
    AuthRequired {
        /// The page fetch failure.
        source: TransferError,
    },

    /// The output directory exists, is non-empty, and overwrite is off.
    #[error("output directory already exists: {}", path.display())]
    AlreadyExists {
        /// The conflicting directory.
        path: PathBuf,
    },

    /// Neither the video nor the archive could be obtained.
    #[error("no assets could be downloaded (video and archive unavailable)")]
    NoAssets,

    /// The output directory could not be prepared.
    #[error("failed to prepare output directory {}: {source}", path.display())]
    Io {
        /// Directory being prepared.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The recording's cancellation token fired.
    #[error("recording download cancelled")]
    Cancelled,

    /// The recording exceeded its time ceiling and was cancelled.
    #[error("recording download timed out after {}s", after.as_secs())]
    TimedOut {
        /// The ceiling that elapsed.
        after: Duration,
    },
}

impl RecordingError {
    /// Classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) | Self::Io { .. } => ErrorKind::Transport,
            Self::AuthRequired { .. } => ErrorKind::AuthRequired,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NoAssets => ErrorKind::EmptyResult,
            Self::Cancelled | Self::TimedOut { .. } => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_required_message_carries_guidance() {
        let err = RecordingError::AuthRequired {
            source: TransferError::AuthRequired {
                url: "https://h.test/rec".to_string(),
                status: 401,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP 401"));
        assert!(msg.contains("?session="));
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
    }

    #[test]
    fn test_no_assets_kind() {
        assert_eq!(RecordingError::NoAssets.kind(), ErrorKind::EmptyResult);
        assert!(RecordingError::NoAssets.to_string().contains("no assets"));
    }
}
