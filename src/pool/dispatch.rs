//! Routes jobs to the shared pool, or runs them on local tasks when no pool
//! is configured.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::job::{DownloadJob, JobError, JobHandle, JobKind, run_job};
use super::{DEFAULT_WORKERS, DocumentOutcome, WorkerPool, count_document_successes};
use crate::download::{HttpClient, TransferRequest};

/// Where a recording's jobs execute.
#[derive(Debug, Clone)]
pub enum JobDispatcher {
    /// Shared bounded pool.
    Pool(Arc<WorkerPool>),
    /// One Tokio task per job; documents bounded by a local semaphore.
    Local(HttpClient),
}

impl JobDispatcher {
    /// HTTP client used for page fetches alongside the jobs.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        match self {
            Self::Pool(pool) => pool.client(),
            Self::Local(client) => client,
        }
    }

    /// Dispatches one job and returns its handle.
    ///
    /// A pool that has been stopped yields a handle resolving to
    /// [`JobError::PoolStopped`].
    pub async fn dispatch(&self, job: DownloadJob) -> JobHandle {
        let (job, handle) = job.with_handle();
        match self {
            Self::Pool(pool) => {
                if let Err(e) = pool.submit(job).await {
                    warn!(error = %e, "job rejected by worker pool");
                }
            }
            Self::Local(client) => {
                let client = client.clone();
                tokio::spawn(async move {
                    let result = run_job(&client, &job).await;
                    job.complete(result);
                });
            }
        }
        handle
    }

    /// Downloads documents and returns how many succeeded.
    pub async fn download_documents(
        &self,
        documents: Vec<(String, TransferRequest)>,
        cancel: &CancellationToken,
    ) -> usize {
        if documents.is_empty() {
            return 0;
        }
        match self {
            Self::Pool(pool) => pool.wait_for_documents(documents, cancel).await,
            Self::Local(client) => {
                let permits = Arc::new(Semaphore::new(DEFAULT_WORKERS.min(documents.len())));
                let (tx, rx) = mpsc::unbounded_channel();
                for (name, request) in documents {
                    let client = client.clone();
                    let permits = Arc::clone(&permits);
                    let tx = tx.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        let destination = request.destination.clone();
                        let result = match permits.acquire_owned().await {
                            Ok(_permit) => {
                                debug!(name = %name, "downloading document");
                                let job = DownloadJob::transfer(JobKind::Document, request, cancel)
                                    .with_name(name.clone());
                                run_job(&client, &job).await
                            }
                            Err(_) => Err(JobError::Cancelled),
                        };
                        let _ = tx.send(DocumentOutcome {
                            name,
                            destination,
                            result,
                        });
                    });
                }
                drop(tx);
                count_document_successes(rx).await
            }
        }
    }
}
