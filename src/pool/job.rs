//! Work items executed by the pool, and single-job completion handles.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::download::{ErrorKind, HttpClient, ProgressCallback, TransferError, TransferRequest};
use crate::extract::{ExtractError, extract_archive};

/// Kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// A shared document from the recording's file-share pod.
    Document,
    /// The raw session archive.
    Archive,
    /// The video rendition.
    Video,
    /// A caption track fetched outside the archive.
    Caption,
    /// Unpacking a downloaded archive.
    Extract,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Video => "video",
            Self::Caption => "caption",
            Self::Extract => "extract",
        };
        f.write_str(label)
    }
}

/// Errors delivered to a job's completion callback.
#[derive(Debug, Error)]
pub enum JobError {
    /// The transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Extraction failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The job's token was cancelled before or during execution.
    #[error("job cancelled")]
    Cancelled,

    /// The pool was stopped before the job could complete.
    #[error("worker pool stopped before the job completed")]
    PoolStopped,
}

impl JobError {
    /// Classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transfer(e) => e.kind(),
            Self::Extract(_) | Self::PoolStopped => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// What a job does.
#[derive(Debug, Clone)]
pub enum JobPayload {
    /// GET a resource to disk.
    Transfer(TransferRequest),
    /// Unpack an archive into a directory.
    Extract {
        /// Archive to read.
        archive: PathBuf,
        /// Destination directory.
        destination: PathBuf,
    },
}

type CompletionCallback = Box<dyn FnOnce(Result<PathBuf, JobError>) + Send + Sync>;

/// An immutable work item; ownership moves to the pool on submission.
///
/// The completion callback fires exactly once with the written path or the
/// error.
pub struct DownloadJob {
    kind: JobKind,
    name: String,
    recording_id: String,
    payload: JobPayload,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for DownloadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadJob")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("recording_id", &self.recording_id)
            .field("payload", &self.payload)
            .field("has_progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl DownloadJob {
    /// Creates a transfer job.
    #[must_use]
    pub fn transfer(kind: JobKind, request: TransferRequest, cancel: CancellationToken) -> Self {
        let name = request
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            kind,
            name,
            recording_id: String::new(),
            payload: JobPayload::Transfer(request),
            progress: None,
            cancel,
            on_complete: None,
        }
    }

    /// Creates an extraction job.
    #[must_use]
    pub fn extract(
        archive: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        let archive = archive.into();
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            kind: JobKind::Extract,
            name,
            recording_id: String::new(),
            payload: JobPayload::Extract {
                archive,
                destination: destination.into(),
            },
            progress: None,
            cancel,
            on_complete: None,
        }
    }

    /// Sets a display name used in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Tags the job with the recording it belongs to.
    #[must_use]
    pub fn with_recording(mut self, recording_id: impl Into<String>) -> Self {
        self.recording_id = recording_id.into();
        self
    }

    /// Attaches a byte-level progress callback (transfer jobs only).
    #[must_use]
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the completion callback, replacing any previous one.
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Result<PathBuf, JobError>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Attaches a oneshot completion handle.
    #[must_use]
    pub fn with_handle(self) -> (Self, JobHandle) {
        let (tx, rx) = oneshot::channel();
        let job = self.on_complete(move |result| {
            let _ = tx.send(result);
        });
        (job, JobHandle { rx })
    }

    /// Job kind.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning recording id (may be empty).
    #[must_use]
    pub fn recording_id(&self) -> &str {
        &self.recording_id
    }

    /// The work to perform.
    #[must_use]
    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    /// Cancellation token observed by the job.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Source URL for logs, truncated to 80 characters.
    #[must_use]
    pub fn display_source(&self) -> String {
        match &self.payload {
            JobPayload::Transfer(request) => truncate_for_log(&request.url, 80),
            JobPayload::Extract { archive, .. } => archive.display().to_string(),
        }
    }

    /// Fires the completion callback. Consumes the job.
    pub(crate) fn complete(mut self, result: Result<PathBuf, JobError>) {
        if let Some(callback) = self.on_complete.take() {
            callback(result);
        }
    }
}

/// Awaitable result of a single submitted job.
#[derive(Debug)]
pub struct JobHandle {
    rx: oneshot::Receiver<Result<PathBuf, JobError>>,
}

impl JobHandle {
    /// Waits for the job to finish.
    ///
    /// # Errors
    ///
    /// Returns the job's error, or [`JobError::PoolStopped`] if the job was
    /// dropped without running.
    pub async fn wait(self) -> Result<PathBuf, JobError> {
        self.rx.await.unwrap_or(Err(JobError::PoolStopped))
    }
}

/// Executes one job on the current task.
pub(crate) async fn run_job(client: &HttpClient, job: &DownloadJob) -> Result<PathBuf, JobError> {
    if job.cancel.is_cancelled() {
        debug!(kind = %job.kind, name = %job.name, "job cancelled before start");
        return Err(JobError::Cancelled);
    }

    match &job.payload {
        JobPayload::Transfer(request) => {
            match client
                .transfer(request, &job.cancel, job.progress.as_ref())
                .await
            {
                Ok(_) => Ok(request.destination.clone()),
                Err(TransferError::Cancelled { .. }) => Err(JobError::Cancelled),
                Err(e) => Err(e.into()),
            }
        }
        JobPayload::Extract {
            archive,
            destination,
        } => {
            // The token also stops the blocking loop left behind by the select.
            tokio::select! {
                biased;
                () = job.cancel.cancelled() => Err(JobError::Cancelled),
                result = extract_archive(archive, destination, &job.cancel) => match result {
                    Ok(_) => Ok(destination.clone()),
                    Err(ExtractError::Cancelled { .. }) => Err(JobError::Cancelled),
                    Err(e) => Err(e.into()),
                },
            }
        }
    }
}

/// Shortens long URLs for log lines.
pub(crate) fn truncate_for_log(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let keep: String = value.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{keep}...")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::TransferKind;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_download_job_can_be_shared_across_tasks() {
        // run_job borrows the job across awaits inside spawned tasks
        assert_send_sync::<DownloadJob>();
        assert_send_sync::<JobHandle>();
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 80), "short");
        let long = "x".repeat(100);
        let shown = truncate_for_log(&long, 80);
        assert_eq!(shown.chars().count(), 80);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn test_transfer_job_defaults_name_to_file_name() {
        let job = DownloadJob::transfer(
            JobKind::Document,
            TransferRequest::new("https://h.test/a.pdf", "/tmp/docs/a.pdf", TransferKind::Binary),
            CancellationToken::new(),
        );
        assert_eq!(job.name(), "a.pdf");
        assert_eq!(job.kind(), JobKind::Document);
    }

    #[tokio::test]
    async fn test_handle_reports_pool_stopped_when_job_dropped() {
        let job = DownloadJob::extract("/tmp/a.zip", "/tmp/a", CancellationToken::new());
        let (job, handle) = job.with_handle();
        drop(job);
        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, JobError::PoolStopped));
    }

    #[tokio::test]
    async fn test_run_job_cancelled_token_skips_io() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let job = DownloadJob::extract("/nonexistent/a.zip", "/nonexistent/out", cancel);
        let err = run_job(&HttpClient::new(), &job).await.unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
    }
}
