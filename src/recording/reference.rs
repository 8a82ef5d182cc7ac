//! Decomposition of a recording URL into the values every download derives from.

use url::Url;

use super::cookies::Session;
use super::error::RecordingUrlError;

/// Immutable identity of one recording, derived once from its page URL.
///
/// # Example
///
/// ```
/// use connectdl_core::RecordingRef;
///
/// let rec = RecordingRef::parse("meet.example.edu/p1abc2def3/?session=xyz").unwrap();
/// assert_eq!(rec.id(), "p1abc2def3");
/// assert_eq!(rec.base_url(), "https://meet.example.edu/p1abc2def3");
/// assert_eq!(
///     rec.archive_url(),
///     "https://meet.example.edu/p1abc2def3/output/p1abc2def3.zip?download=zip"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRef {
    id: String,
    base_url: String,
    origin: String,
    source_url: String,
    hostname: String,
    query_session: Option<String>,
}

impl RecordingRef {
    /// Parses a recording page URL.
    ///
    /// A missing scheme defaults to `https://`. The recording id is the last
    /// non-empty path segment.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingUrlError`] if the URL is malformed, has no host, or
    /// has an empty path.
    pub fn parse(raw: &str) -> Result<Self, RecordingUrlError> {
        let trimmed = raw.trim();
        let source_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let parsed = Url::parse(&source_url).map_err(|source| RecordingUrlError::Malformed {
            url: raw.to_string(),
            source,
        })?;

        let Some(host) = parsed.host_str().filter(|h| !h.is_empty()) else {
            return Err(RecordingUrlError::MissingHost {
                url: raw.to_string(),
            });
        };
        let hostname = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let Some(id) = segments.last() else {
            return Err(RecordingUrlError::MissingId {
                url: raw.to_string(),
            });
        };

        let origin = format!("{}://{hostname}", parsed.scheme());
        let base_url = format!("{origin}/{}", segments.join("/"));
        let query_session = parsed
            .query_pairs()
            .find(|(key, _)| key == "session")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());

        Ok(Self {
            id: (*id).to_string(),
            base_url,
            origin,
            source_url,
            hostname,
            query_session,
        })
    }

    /// Recording id (last path segment).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `scheme://host/<path>` without trailing slash or query.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The page URL as given (with the default scheme applied).
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Host including a non-default port.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// URL of the raw session archive for this recording.
    #[must_use]
    pub fn archive_url(&self) -> String {
        format!("{}/output/{}.zip?download=zip", self.base_url, self.id)
    }

    /// Resolves a caption reference found in the page into an absolute URL.
    ///
    /// Absolute URLs are kept, absolute paths are joined to the origin and
    /// bare file names live in the recording's `output/` folder.
    #[must_use]
    pub fn resolve_caption_url(&self, caption_path: &str) -> String {
        if caption_path.starts_with("http://") || caption_path.starts_with("https://") {
            caption_path.to_string()
        } else if caption_path.starts_with('/') {
            format!("{}{caption_path}", self.origin)
        } else {
            format!(
                "{}/output/{}",
                self.base_url,
                urlencoding::encode(caption_path)
            )
        }
    }

    /// Picks the session for this recording: an explicit token wins over the
    /// `session` query parameter.
    #[must_use]
    pub fn resolve_session(&self, explicit: Option<&str>) -> Option<Session> {
        explicit
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .or(self.query_session.as_deref())
            .map(Session::new)
    }
}
