//! HTTP client wrapper for recording pages and asset transfers.
//!
//! This module provides the `HttpClient` struct which owns the process-wide
//! connection pool and builds every request with the headers recording
//! servers expect.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, COOKIE, REFERER};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::constants::{
    CONNECT_TIMEOUT_SECS, MAX_IDLE_PER_HOST, PAGE_BODY_LIMIT, POOL_IDLE_TIMEOUT, READ_TIMEOUT_SECS,
};
use super::error::TransferError;
use super::transfer::{ProgressCallback, TransferRequest, stream_validated};
use crate::recording::{Cookie, CookieSet, Session};
use crate::user_agent::{BROWSER_USER_AGENT, MEDIA_ACCEPT};

/// Body and cookies of a fetched recording page.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    /// Page body, truncated at the page size cap.
    pub body: Vec<u8>,
    /// Cookies set by the page response.
    pub cookies: Vec<Cookie>,
}

/// HTTP client shared by every recording in a run.
///
/// Cookies are not stored in a jar: each request carries the explicit
/// [`CookieSet`] of the recording it belongs to, so concurrent recordings
/// with different sessions never see each other's cookies.
///
/// # Example
///
/// ```no_run
/// use connectdl_core::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use tokio_util::sync::CancellationToken;
///
/// let client = HttpClient::new();
/// let cancel = CancellationToken::new();
/// let page = client
///     .fetch_page("https://meet.example.edu/p1abc/", None, &cancel)
///     .await?;
/// println!("page is {} bytes", page.body.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (no overall request deadline)
    /// - 20 idle connections per host, 90 second idle timeout
    /// - No response decompression (bodies are written verbatim)
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches a recording page with only the session cookie attached.
    ///
    /// # Errors
    ///
    /// - [`TransferError::AuthRequired`] for 401, 403 and 500 (the server
    ///   answers 500 to anonymous requests for private recordings)
    /// - [`TransferError::HttpStatus`] for any other status >= 400
    /// - [`TransferError::Network`] / [`TransferError::Timeout`] on transport failure
    /// - [`TransferError::Cancelled`] when `cancel` fires first
    #[instrument(skip(self, session, cancel), fields(url = %url))]
    pub async fn fetch_page(
        &self,
        url: &str,
        session: Option<&Session>,
        cancel: &CancellationToken,
    ) -> Result<PageResponse, TransferError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("page fetch cancelled");
                Err(TransferError::cancelled(url))
            }
            result = self.fetch_page_inner(url, session) => result,
        }
    }

    async fn fetch_page_inner(
        &self,
        url: &str,
        session: Option<&Session>,
    ) -> Result<PageResponse, TransferError> {
        let mut request = self.client.get(url);
        if let Some(cookie) = CookieSet::from_session(session).header_value() {
            request = request.header(COOKIE, cookie);
        }

        debug!("fetching page");
        let response = request
            .send()
            .await
            .map_err(|e| TransferError::network(url, e))?;

        let status = response.status().as_u16();
        if matches!(status, 401 | 403 | 500) {
            return Err(TransferError::AuthRequired {
                url: url.to_string(),
                status,
            });
        }
        if status >= 400 {
            return Err(TransferError::http_status(url, status));
        }

        let cookies: Vec<Cookie> = response
            .cookies()
            .map(|c| Cookie::new(c.name(), c.value()))
            .collect();

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::network(url, e))?;
            let room = PAGE_BODY_LIMIT - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(limit = PAGE_BODY_LIMIT, "page body truncated");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), cookies = cookies.len(), "page fetched");
        Ok(PageResponse { body, cookies })
    }

    /// Downloads one resource to `request.destination`, validating its shape.
    ///
    /// Returns the number of bytes written. On failure a partially written
    /// destination may remain; removing it is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] classified by [`TransferError::kind`];
    /// cancellation of `cancel` yields [`TransferError::Cancelled`].
    #[instrument(skip_all, fields(url = %request.url, kind = ?request.kind))]
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<u64, TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::cancelled(&request.url));
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("transfer cancelled");
                Err(TransferError::cancelled(&request.url))
            }
            result = self.transfer_inner(request, progress) => result,
        }
    }

    async fn transfer_inner(
        &self,
        request: &TransferRequest,
        progress: Option<&ProgressCallback>,
    ) -> Result<u64, TransferError> {
        let url = request.url.as_str();
        if reqwest::Url::parse(url).is_err() {
            return Err(TransferError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let mut builder = self.client.get(url);
        if let Some(cookie) = request.cookies.header_value() {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(referer) = request.referer.as_deref() {
            builder = builder.header(REFERER, referer);
        }
        if request.kind.wants_media_accept() {
            builder = builder.header(ACCEPT, MEDIA_ACCEPT);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransferError::network(url, e))?;

        let status = response.status().as_u16();
        match status {
            403 => return Err(TransferError::Forbidden { url: url.to_string() }),
            404 => return Err(TransferError::not_found(url)),
            s if s >= 300 => return Err(TransferError::http_status(url, s)),
            _ => {}
        }

        stream_validated(response, request, progress).await
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_page_sends_session_cookie_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rec1/"))
            .and(header("cookie", "BREEZESESSION=tok123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "JSESSIONID=abc; Path=/")
                    .set_body_string("<html><title>T</title></html>"),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let session = Session::new("tok123");
        let page = client
            .fetch_page(&format!("{}/rec1/", server.uri()), Some(&session), &CancellationToken::new())
            .await
            .unwrap();

        assert!(String::from_utf8_lossy(&page.body).contains("<title>T</title>"));
        assert_eq!(page.cookies, vec![Cookie::new("JSESSIONID", "abc")]);
    }

    #[tokio::test]
    async fn test_fetch_page_auth_statuses() {
        let server = MockServer::start().await;
        for (route, status) in [("/a", 401), ("/b", 403), ("/c", 500)] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }

        let client = HttpClient::new();
        for route in ["/a", "/b", "/c"] {
            let err = client
                .fetch_page(&format!("{}{route}", server.uri()), None, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(
                matches!(err, TransferError::AuthRequired { .. }),
                "expected AuthRequired for {route}, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_page_other_client_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let err = HttpClient::new()
            .fetch_page(&format!("{}/gone", server.uri()), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::HttpStatus { status: 410, .. }));
    }

    #[tokio::test]
    async fn test_fetch_page_truncates_large_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; PAGE_BODY_LIMIT + 10]))
            .mount(&server)
            .await;

        let page = HttpClient::new()
            .fetch_page(&format!("{}/big", server.uri()), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(page.body.len(), PAGE_BODY_LIMIT);
    }

    #[tokio::test]
    async fn test_fetch_page_returns_promptly_when_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = HttpClient::new()
            .fetch_page(&format!("{}/slow", server.uri()), None, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
