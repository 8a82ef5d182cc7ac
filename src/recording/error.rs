//! Error types for recording URL parsing.

use thiserror::Error;

/// Errors produced when a recording URL cannot be decomposed.
#[derive(Debug, Error)]
pub enum RecordingUrlError {
    /// The URL could not be parsed at all.
    #[error("invalid recording URL {url}: {source}")]
    Malformed {
        /// The offending input.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The URL has no host component.
    #[error("invalid recording URL {url}: host missing")]
    MissingHost {
        /// The offending input.
        url: String,
    },

    /// The URL path has no segment to use as the recording id.
    #[error("invalid recording URL {url}: recording id missing")]
    MissingId {
        /// The offending input.
        url: String,
    },
}
