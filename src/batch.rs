//! Multi-recording runs.
//!
//! [`BatchCoordinator`] feeds a de-duplicated URL list through one
//! [`Downloader`]. Concurrent mode runs up to `max_concurrent` recordings at
//! once with overwrite forced; sequential mode runs them one by one so an
//! existing directory can be confirmed interactively through an
//! [`OverwritePrompt`]. Every recording gets its own time ceiling, and one
//! recording's failure never stops the others.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::download::ProgressCallback;
use crate::orchestrator::{Downloader, RecordingError, RecordingOptions, RecordingResult};

/// Default number of recordings processed at once in concurrent mode.
pub const DEFAULT_MAX_CONCURRENT_RECORDINGS: usize = 12;

/// Default ceiling for one recording.
pub const DEFAULT_RECORDING_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How long a timed-out recording gets to clean up after cancellation.
const CANCEL_GRACE: Duration = Duration::from_secs(30);

/// Removes duplicates and blank entries, keeping first-seen order.
#[must_use]
pub fn dedupe_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(|url| url.as_ref().trim().to_string())
        .filter(|url| !url.is_empty() && seen.insert(url.clone()))
        .collect()
}

/// Asks whether an existing recording directory may be overwritten.
#[async_trait]
pub trait OverwritePrompt: Send + Sync {
    /// Returns true to retry the recording with overwrite forced.
    async fn confirm_overwrite(&self, path: &Path) -> bool;
}

/// Hooks into the lifecycle of each recording. Both methods default to no-ops.
pub trait BatchObserver: Send + Sync {
    /// Called before a recording starts; may return an extra progress sink
    /// for its video download.
    fn recording_started(&self, _label: &str, _url: &str) -> Option<ProgressCallback> {
        None
    }

    /// Called once a recording has a final outcome.
    fn recording_finished(
        &self,
        _url: &str,
        _outcome: Result<&RecordingResult, &RecordingError>,
    ) {
    }

    /// Called instead of `recording_finished` when overwrite was declined.
    fn recording_skipped(&self, _url: &str) {}
}

/// Batch scheduling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Run recordings in parallel with overwrite forced.
    pub concurrent: bool,
    /// Parallel recordings in concurrent mode.
    pub max_concurrent: usize,
    /// Ceiling for one recording, including an overwrite retry.
    pub recording_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrent: false,
            max_concurrent: DEFAULT_MAX_CONCURRENT_RECORDINGS,
            recording_timeout: DEFAULT_RECORDING_TIMEOUT,
        }
    }
}

impl BatchOptions {
    /// Concurrent mode is used for several URLs with overwrite set, unless
    /// sequential processing is requested.
    #[must_use]
    pub fn for_run(url_count: usize, overwrite: bool, sequential: bool) -> Self {
        Self {
            concurrent: url_count > 1 && overwrite && !sequential,
            ..Self::default()
        }
    }
}

/// Outcome counts of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Recordings saved.
    pub successful: usize,
    /// Recordings that ended with an error.
    pub failed: usize,
    /// Recordings skipped at the overwrite prompt.
    pub skipped: usize,
    /// Failed URLs in input order.
    pub failed_urls: Vec<String>,
    /// Size of the saved videos and archives.
    pub total_bytes: u64,
    /// Wall time of the batch.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// True when no recording failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs many recordings through one [`Downloader`].
#[derive(Clone)]
pub struct BatchCoordinator {
    downloader: Downloader,
    options: BatchOptions,
    prompt: Option<Arc<dyn OverwritePrompt>>,
    observer: Option<Arc<dyn BatchObserver>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("options", &self.options)
            .field("has_prompt", &self.prompt.is_some())
            .finish_non_exhaustive()
    }
}

impl BatchCoordinator {
    /// Creates a coordinator without prompt or observer.
    #[must_use]
    pub fn new(downloader: Downloader, options: BatchOptions) -> Self {
        Self {
            downloader,
            options,
            prompt: None,
            observer: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the overwrite prompt used in sequential mode.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn OverwritePrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Sets the lifecycle observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Uses `cancel` as the parent of every recording's token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Processes every URL and summarizes the outcome.
    pub async fn run(&self, urls: &[String], base: &RecordingOptions) -> BatchSummary {
        let started = Instant::now();
        info!(
            count = urls.len(),
            concurrent = self.options.concurrent,
            "starting batch download"
        );

        let mut summary = if self.options.concurrent {
            self.run_concurrent(urls, base).await
        } else {
            self.run_sequential(urls, base).await
        };
        summary.elapsed = started.elapsed();

        info!(
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "batch complete"
        );
        summary
    }

    async fn run_sequential(&self, urls: &[String], base: &RecordingOptions) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let total = urls.len();

        for (index, url) in urls.iter().enumerate() {
            let mut outcome = self.run_one(index, total, url, base).await;

            if !base.overwrite
                && let Err(RecordingError::AlreadyExists { path }) = &outcome
            {
                let confirmed = match &self.prompt {
                    Some(prompt) => prompt.confirm_overwrite(path).await,
                    None => false,
                };
                if !confirmed {
                    info!(url = %url, "skipping recording");
                    if let Some(observer) = &self.observer {
                        observer.recording_skipped(url);
                    }
                    summary.skipped += 1;
                    continue;
                }
                let forced = base.clone().with_overwrite(true);
                outcome = self.run_one(index, total, url, &forced).await;
            }

            self.tally(&mut summary, url, outcome).await;
        }
        summary
    }

    async fn run_concurrent(&self, urls: &[String], base: &RecordingOptions) -> BatchSummary {
        let total = urls.len();
        let limit = self.options.max_concurrent.max(1);
        info!(recordings = total, workers = limit, "concurrent download mode");

        let permits = Arc::new(Semaphore::new(limit));
        let forced = base.clone().with_overwrite(true);
        let mut tasks = JoinSet::new();
        for (index, url) in urls.iter().enumerate() {
            let this = self.clone();
            let permits = Arc::clone(&permits);
            let options = forced.clone();
            let url = url.clone();
            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => this.run_one(index, total, &url, &options).await,
                    Err(_) => Err(RecordingError::Cancelled),
                };
                (index, url, outcome)
            });
        }

        let mut finished = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => finished.push(entry),
                Err(e) => error!(error = %e, "recording task ended abnormally"),
            }
        }
        finished.sort_by_key(|(index, _, _)| *index);

        let mut summary = BatchSummary::default();
        for (_, url, outcome) in finished {
            self.tally(&mut summary, &url, outcome).await;
        }
        summary
    }

    /// Runs one recording under its own child token and time ceiling.
    async fn run_one(
        &self,
        index: usize,
        total: usize,
        url: &str,
        base: &RecordingOptions,
    ) -> Result<RecordingResult, RecordingError> {
        let label = format!("{}/{total}", index + 1);
        info!(url = %url, "processing recording {label}");

        let extra = self
            .observer
            .as_ref()
            .and_then(|observer| observer.recording_started(&label, url));
        let mut options = base.clone();
        options.progress = Some(logging_progress(label, extra));

        let cancel = self.cancel.child_token();
        let ceiling = self.options.recording_timeout;
        let download = self.downloader.download(url, &options, &cancel);
        tokio::pin!(download);

        tokio::select! {
            outcome = &mut download => outcome,
            () = tokio::time::sleep(ceiling) => {
                warn!(url = %url, after_secs = ceiling.as_secs(), "recording timed out");
                cancel.cancel();
                // Let the cancelled download remove its staged files.
                if tokio::time::timeout(CANCEL_GRACE, &mut download).await.is_err() {
                    warn!(url = %url, "recording did not stop after cancellation");
                }
                Err(RecordingError::TimedOut { after: ceiling })
            }
        }
    }

    async fn tally(
        &self,
        summary: &mut BatchSummary,
        url: &str,
        outcome: Result<RecordingResult, RecordingError>,
    ) {
        if let Some(observer) = &self.observer {
            observer.recording_finished(url, outcome.as_ref());
        }
        match outcome {
            Ok(result) => {
                info!(
                    title = %result.title,
                    location = %result.root_dir.display(),
                    "download complete"
                );
                for warning in &result.warnings {
                    warn!(url = %url, "{warning}");
                }
                for path in [&result.video_path, &result.archive_path].into_iter().flatten() {
                    if let Ok(meta) = tokio::fs::metadata(path).await {
                        summary.total_bytes += meta.len();
                    }
                }
                summary.successful += 1;
            }
            Err(e) => {
                error!(url = %url, error = %e, "failed to download recording");
                summary.failed += 1;
                summary.failed_urls.push(url.to_string());
            }
        }
    }
}

/// Logs video progress at every 10% step, then forwards to `extra`.
fn logging_progress(label: String, extra: Option<ProgressCallback>) -> ProgressCallback {
    // Highest decile logged so far, offset by one; starts past 0-9%.
    let logged = AtomicU64::new(1);
    Arc::new(move |downloaded, total| {
        if total > 0 {
            let percent = downloaded.saturating_mul(100) / total;
            let decile = percent / 10 + 1;
            if logged.fetch_max(decile, Ordering::SeqCst) < decile {
                info!(
                    recording = %label,
                    "video download: {percent}% ({:.1}/{:.1} MB)",
                    megabytes(downloaded),
                    megabytes(total)
                );
            } else {
                debug!(recording = %label, downloaded, total, "video progress");
            }
        }
        if let Some(extra) = &extra {
            extra(downloaded, total);
        }
    })
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::FileOptions;

    use crate::download::HttpClient;

    struct FixedPrompt {
        answer: bool,
        asked: AtomicUsize,
    }

    #[async_trait]
    impl OverwritePrompt for FixedPrompt {
        async fn confirm_overwrite(&self, _path: &Path) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn zip_bytes() -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("indexstream.xml", FileOptions::default()).unwrap();
        writer.write_all(b"<root/>").unwrap();
        writer.finish().unwrap().into_inner()
    }

    /// A recording whose page is missing and whose archive is served.
    async fn archive_only_server(id: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{id}/output/{id}.zip")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{id}/")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_dedupe_urls_preserves_order() {
        let urls = dedupe_urls(["https://a.test/1", " https://b.test/2", "", "https://a.test/1"]);
        assert_eq!(urls, vec!["https://a.test/1", "https://b.test/2"]);
    }

    #[test]
    fn test_batch_options_mode_selection() {
        assert!(BatchOptions::for_run(3, true, false).concurrent);
        assert!(!BatchOptions::for_run(1, true, false).concurrent);
        assert!(!BatchOptions::for_run(3, false, false).concurrent);
        assert!(!BatchOptions::for_run(3, true, true).concurrent);
        assert_eq!(BatchOptions::default().max_concurrent, 12);
        assert_eq!(BatchOptions::default().recording_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_logging_progress_forwards_every_update() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let extra: ProgressCallback = Arc::new(move |d, t| sink.lock().unwrap().push((d, t)));
        let progress = logging_progress("1/1".to_string(), Some(extra));

        progress(10, 100);
        progress(55, 100);
        progress(100, 100);
        progress(5, 0);

        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_urls_are_counted_as_failures() {
        let temp = TempDir::new().unwrap();
        let coordinator = BatchCoordinator::new(
            Downloader::new(HttpClient::new()),
            BatchOptions {
                concurrent: true,
                ..BatchOptions::default()
            },
        );
        let urls = vec!["https://h.test/".to_string(), "https:///x".to_string()];

        let summary = coordinator
            .run(&urls, &RecordingOptions::new(temp.path()))
            .await;

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_urls, urls);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_sequential_declined_prompt_skips_without_failure() {
        let server = archive_only_server("rec1").await;
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("rec1")).unwrap();
        std::fs::write(temp.path().join("rec1").join("old.txt"), b"x").unwrap();

        let prompt = Arc::new(FixedPrompt {
            answer: false,
            asked: AtomicUsize::new(0),
        });
        let coordinator =
            BatchCoordinator::new(Downloader::new(HttpClient::new()), BatchOptions::default())
                .with_prompt(prompt.clone());
        let urls = vec![format!("{}/rec1/", server.uri())];

        let summary = coordinator
            .run(&urls, &RecordingOptions::new(temp.path()))
            .await;

        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.successful, 0);
        assert!(!temp.path().join("rec1").join("raw.zip").exists());
    }

    #[tokio::test]
    async fn test_sequential_confirmed_prompt_retries_with_overwrite() {
        let server = archive_only_server("rec2").await;
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("rec2")).unwrap();
        std::fs::write(temp.path().join("rec2").join("old.txt"), b"x").unwrap();

        let prompt = Arc::new(FixedPrompt {
            answer: true,
            asked: AtomicUsize::new(0),
        });
        let coordinator =
            BatchCoordinator::new(Downloader::new(HttpClient::new()), BatchOptions::default())
                .with_prompt(prompt.clone());
        let urls = vec![format!("{}/rec2/", server.uri())];

        let summary = coordinator
            .run(&urls, &RecordingOptions::new(temp.path()))
            .await;

        assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
        assert_eq!(summary.successful, 1);
        assert!(summary.total_bytes > 0);
        assert!(temp.path().join("rec2").join("raw.zip").exists());
        assert!(temp.path().join("rec2").join("old.txt").exists());
    }

    #[tokio::test]
    async fn test_recording_timeout_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let coordinator = BatchCoordinator::new(
            Downloader::new(HttpClient::new()),
            BatchOptions {
                recording_timeout: Duration::from_millis(200),
                ..BatchOptions::default()
            },
        );
        let urls = vec![format!("{}/slow/", server.uri())];

        let summary = coordinator
            .run(&urls, &RecordingOptions::new(temp.path()))
            .await;

        assert_eq!(summary.failed, 1);
        assert!(summary.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timed_out_recording_leaves_no_staged_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rec3/output/rec3.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rec3/"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let coordinator = BatchCoordinator::new(
            Downloader::new(HttpClient::new()),
            BatchOptions {
                recording_timeout: Duration::from_millis(500),
                ..BatchOptions::default()
            },
        );
        let urls = vec![format!("{}/rec3/", server.uri())];

        let summary = coordinator
            .run(&urls, &RecordingOptions::new(temp.path()))
            .await;

        assert_eq!(summary.failed, 1);
        assert!(summary.elapsed < Duration::from_secs(5));
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }
}
