//! Bounded worker pool shared by every in-flight recording.
//!
//! A fixed set of long-lived workers drains one bounded job queue. Recordings
//! submit heterogeneous jobs (documents, archives, videos, captions,
//! extractions) and await them through [`JobHandle`]s or a document result
//! channel.
//!
//! # Concurrency Model
//!
//! - Workers share the receiving half of a bounded `mpsc` channel
//! - `submit` never drops a job: when the queue is full it waits for space
//! - `stop` closes submission, then waits for queued and running jobs
//! - Counters are atomics readable at any time; stable after `stop`
//!
//! # Example
//!
//! ```no_run
//! use connectdl_core::download::{HttpClient, TransferKind, TransferRequest};
//! use connectdl_core::pool::{PoolConfig, WorkerPool};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = WorkerPool::new(HttpClient::new(), PoolConfig::default())?;
//! pool.start();
//! let request = TransferRequest::new("https://h.test/a.pdf", "./a.pdf", TransferKind::Binary);
//! let handle = pool.submit_caption(request, CancellationToken::new()).await?;
//! handle.wait().await?;
//! pool.stop().await;
//! println!("completed: {}", pool.stats().completed());
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod job;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::download::{HttpClient, ProgressCallback, TransferRequest};

pub use dispatch::JobDispatcher;
pub use job::{DownloadJob, JobError, JobHandle, JobKind, JobPayload};
pub(crate) use job::{run_job, truncate_for_log};

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 12;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 64;

/// Errors returned by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Submission after `stop()`.
    #[error("worker pool is stopped")]
    Stopped,

    /// Configuration out of range.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },
}

/// Worker count and queue capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of long-lived workers (1-64).
    pub workers: usize,
    /// Jobs that can wait in the queue before `submit` blocks.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PoolConfig {
    fn validate(self) -> Result<Self, PoolError> {
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(PoolError::InvalidConfig {
                reason: format!(
                    "workers must be between 1 and {MAX_WORKERS}, got {}",
                    self.workers
                ),
            });
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "queue capacity must be at least 1".to_string(),
            });
        }
        Ok(self)
    }
}

/// Completed/failed job counters for one pool instance.
#[derive(Debug, Default)]
pub struct PoolStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl PoolStats {
    /// Returns the number of jobs that succeeded.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of jobs that failed (including cancelled jobs).
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns completed + failed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Outcome of one document in a fan-out.
#[derive(Debug)]
pub struct DocumentOutcome {
    /// Document display name.
    pub name: String,
    /// Destination path.
    pub destination: PathBuf,
    /// Job result.
    pub result: Result<PathBuf, JobError>,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<DownloadJob>>>;

/// Fixed-size pool of download/extraction workers.
#[derive(Debug)]
pub struct WorkerPool {
    client: HttpClient,
    config: PoolConfig,
    sender: Mutex<Option<mpsc::Sender<DownloadJob>>>,
    receiver: SharedReceiver,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Creates a pool. Workers are not running until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for a zero or excessive worker
    /// count, or a zero queue capacity.
    pub fn new(client: HttpClient, config: PoolConfig) -> Result<Self, PoolError> {
        let config = config.validate()?;
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        Ok(Self {
            client,
            config,
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stats: Arc::new(PoolStats::default()),
        })
    }

    /// Launches the workers. Calling it again is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            warn!("start() called on a stopped worker pool");
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for worker_id in 0..self.config.workers {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.receiver),
                self.client.clone(),
                Arc::clone(&self.stats),
            )));
        }
        info!(
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            "worker pool started"
        );
    }

    /// Enqueues a job, waiting for queue space when full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] after [`stop`](Self::stop); the job is
    /// dropped without running and its callback never fires.
    pub async fn submit(&self, job: DownloadJob) -> Result<(), PoolError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PoolError::Stopped)?;

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                warn!(
                    kind = %job.kind(),
                    name = %job.name(),
                    "job queue full, waiting for space"
                );
                sender.send(job).await.map_err(|_| PoolError::Stopped)
            }
            Err(TrySendError::Closed(_)) => Err(PoolError::Stopped),
        }
    }

    /// Closes submission and waits for every queued job to finish.
    ///
    /// Idempotent; later calls return immediately.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let handles =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }

        info!(
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            "worker pool stopped"
        );
    }

    /// Returns true once `stop()` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Job counters.
    #[must_use]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Pool configuration.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Shared HTTP client used by the workers.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Submits a job and returns a handle to await its result.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] after `stop()`.
    pub async fn submit_with_handle(&self, job: DownloadJob) -> Result<JobHandle, PoolError> {
        let (job, handle) = job.with_handle();
        self.submit(job).await?;
        Ok(handle)
    }

    /// Submits the video download.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] after `stop()`.
    pub async fn submit_video(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<JobHandle, PoolError> {
        self.submit_with_handle(
            DownloadJob::transfer(JobKind::Video, request, cancel).with_progress(progress),
        )
        .await
    }

    /// Submits the archive download.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] after `stop()`.
    pub async fn submit_archive(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> Result<JobHandle, PoolError> {
        self.submit_with_handle(DownloadJob::transfer(JobKind::Archive, request, cancel))
            .await
    }

    /// Submits a caption download.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] after `stop()`.
    pub async fn submit_caption(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> Result<JobHandle, PoolError> {
        self.submit_with_handle(DownloadJob::transfer(JobKind::Caption, request, cancel))
            .await
    }

    /// Submits an archive extraction.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] after `stop()`.
    pub async fn submit_extract(
        &self,
        archive: PathBuf,
        destination: PathBuf,
        cancel: CancellationToken,
    ) -> Result<JobHandle, PoolError> {
        self.submit_with_handle(DownloadJob::extract(archive, destination, cancel))
            .await
    }

    /// Fans out document downloads.
    ///
    /// The returned channel yields one [`DocumentOutcome`] per accepted
    /// document and closes once all of them have completed.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Stopped`] if the pool stops before the first
    /// document is accepted.
    pub async fn submit_documents(
        &self,
        documents: Vec<(String, TransferRequest)>,
        cancel: &CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<DocumentOutcome>, PoolError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let total = documents.len();
        for (index, (name, request)) in documents.into_iter().enumerate() {
            let destination = request.destination.clone();
            let outcome_tx = tx.clone();
            let outcome_name = name.clone();
            let job = DownloadJob::transfer(JobKind::Document, request, cancel.clone())
                .with_name(name)
                .on_complete(move |result| {
                    let _ = outcome_tx.send(DocumentOutcome {
                        name: outcome_name,
                        destination,
                        result,
                    });
                });
            debug!(num = index + 1, total, "submitting document");
            if let Err(e) = self.submit(job).await {
                if index == 0 {
                    return Err(e);
                }
                warn!(accepted = index, total, "pool stopped during document fan-out");
                break;
            }
        }
        Ok(rx)
    }

    /// Downloads all documents through the pool and returns how many succeeded.
    pub async fn wait_for_documents(
        &self,
        documents: Vec<(String, TransferRequest)>,
        cancel: &CancellationToken,
    ) -> usize {
        if documents.is_empty() {
            return 0;
        }
        match self.submit_documents(documents, cancel).await {
            Ok(rx) => count_document_successes(rx).await,
            Err(e) => {
                warn!(error = %e, "document fan-out rejected");
                0
            }
        }
    }
}

/// Drains a document outcome channel, removing partial files of failed documents.
pub(crate) async fn count_document_successes(
    mut rx: mpsc::UnboundedReceiver<DocumentOutcome>,
) -> usize {
    let mut succeeded = 0;
    while let Some(outcome) = rx.recv().await {
        match outcome.result {
            Ok(_) => succeeded += 1,
            Err(e) => {
                warn!(name = %outcome.name, error = %e, "document download failed");
                let _ = tokio::fs::remove_file(&outcome.destination).await;
            }
        }
    }
    succeeded
}

async fn worker_loop(
    worker_id: usize,
    receiver: SharedReceiver,
    client: HttpClient,
    stats: Arc<PoolStats>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            debug!(worker_id, "job queue closed, worker exiting");
            break;
        };

        debug!(
            worker_id,
            kind = %job.kind(),
            name = %job.name(),
            recording = %job.recording_id(),
            source = %job.display_source(),
            "job started"
        );
        let result = run_job(&client, &job).await;
        match &result {
            Ok(path) => {
                stats.increment_completed();
                debug!(worker_id, kind = %job.kind(), path = %path.display(), "job finished");
            }
            Err(e) => {
                stats.increment_failed();
                warn!(
                    worker_id,
                    kind = %job.kind(),
                    name = %job.name(),
                    source = %job.display_source(),
                    error = %e,
                    "job failed"
                );
            }
        }
        job.complete(result);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::TransferKind;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_pool_config_validation() {
        let client = HttpClient::new();
        assert!(WorkerPool::new(client.clone(), PoolConfig::default()).is_ok());
        let err = WorkerPool::new(
            client.clone(),
            PoolConfig {
                workers: 0,
                queue_capacity: 10,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("workers"), "got: {err}");
        assert!(
            WorkerPool::new(
                client,
                PoolConfig {
                    workers: 2,
                    queue_capacity: 0
                }
            )
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_submit_after_stop_is_rejected() {
        let pool = WorkerPool::new(HttpClient::new(), PoolConfig::default()).unwrap();
        pool.start();
        pool.stop().await;
        pool.stop().await;
        assert!(pool.is_stopped());

        let job = DownloadJob::extract("/tmp/x.zip", "/tmp/x", CancellationToken::new());
        let err = pool.submit(job).await.unwrap_err();
        assert!(matches!(err, PoolError::Stopped));
        assert_eq!(pool.stats().total(), 0);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let pool = WorkerPool::new(
            HttpClient::new(),
            PoolConfig {
                workers: 3,
                queue_capacity: 4,
            },
        )
        .unwrap();
        pool.start();
        pool.start();
        assert_eq!(pool.workers.lock().unwrap().len(), 3);
        pool.stop().await;
    }

    #[tokio::test]
    async fn test_cancelled_job_counts_as_failed_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 10]))
            .expect(0)
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let pool = WorkerPool::new(HttpClient::new(), PoolConfig::default()).unwrap();
        pool.start();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = TransferRequest::new(
            format!("{}/a.pdf", server.uri()),
            temp.path().join("a.pdf"),
            TransferKind::Binary,
        );
        let handle = pool.submit_caption(request, cancel).await.unwrap();
        let err = handle.wait().await.unwrap_err();

        assert!(matches!(err, JobError::Cancelled));
        pool.stop().await;
        assert_eq!(pool.stats().failed(), 1);
        assert_eq!(pool.stats().completed(), 0);
    }

    #[tokio::test]
    async fn test_backpressure_waits_and_every_callback_fires_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![9u8; 256])
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let pool = WorkerPool::new(
            HttpClient::new(),
            PoolConfig {
                workers: 1,
                queue_capacity: 1,
            },
        )
        .unwrap();
        pool.start();

        let fired = Arc::new(AtomicUsize::new(0));
        for i in 0..5 {
            let counter = Arc::clone(&fired);
            let request = TransferRequest::new(
                format!("{}/doc{i}.bin", server.uri()),
                temp.path().join(format!("doc{i}.bin")),
                TransferKind::Binary,
            );
            let job = DownloadJob::transfer(JobKind::Document, request, CancellationToken::new())
                .on_complete(move |result| {
                    assert!(result.is_ok(), "job failed: {result:?}");
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            pool.submit(job).await.unwrap();
        }

        pool.stop().await;
        assert_eq!(fired.load(Ordering::SeqCst), 5);
        assert_eq!(pool.stats().completed(), 5);
        assert_eq!(pool.stats().failed(), 0);
        for i in 0..5 {
            assert!(temp.path().join(format!("doc{i}.bin")).exists());
        }
    }

    #[tokio::test]
    async fn test_wait_for_documents_counts_successes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/ok.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::path("/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let temp = TempDir::new().unwrap();
        let pool = WorkerPool::new(HttpClient::new(), PoolConfig::default()).unwrap();
        pool.start();

        let docs = vec![
            (
                "ok.pdf".to_string(),
                TransferRequest::new(
                    format!("{}/ok.pdf", server.uri()),
                    temp.path().join("ok.pdf"),
                    TransferKind::Binary,
                ),
            ),
            (
                "missing.pdf".to_string(),
                TransferRequest::new(
                    format!("{}/missing.pdf", server.uri()),
                    temp.path().join("missing.pdf"),
                    TransferKind::Binary,
                ),
            ),
        ];
        let downloaded = pool
            .wait_for_documents(docs, &CancellationToken::new())
            .await;

        assert_eq!(downloaded, 1);
        assert!(temp.path().join("ok.pdf").exists());
        assert!(!temp.path().join("missing.pdf").exists());
        pool.stop().await;
    }
}
