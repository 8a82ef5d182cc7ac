//! Per-recording download orchestration.
//!
//! One call to [`Downloader::download`] turns a recording URL into a titled
//! directory holding the video, the raw archive and everything derived from
//! it. Asset-level failures are collected as warnings; only conditions that
//! leave nothing useful behind end the recording with a [`RecordingError`].
//!
//! # Flow
//!
//! 1. The archive download starts at once (its URL only needs the recording
//!    id) while the page is fetched for title, video URL and caption path.
//! 2. The title picks the output directory; existing content is rejected
//!    unless overwrite is set.
//! 3. The video downloads while the archive is moved into place, extracted
//!    and post-processed.
//! 4. Captions are cleaned, transcribed and embedded once both branches are
//!    done; `metadata.json` is written last.

mod error;
mod postprocess;
mod record;
pub mod staging;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::download::{
    ErrorKind, HttpClient, PageResponse, ProgressCallback, TransferError, TransferKind,
    TransferRequest,
};
use crate::metadata::{ConnectExtractor, MetadataExtractor, PageMetadata};
use crate::mux::SubtitleEmbedder;
use crate::pool::{
    DownloadJob, JobDispatcher, JobError, JobHandle, JobKind, WorkerPool, truncate_for_log,
};
use crate::recording::{CookieSet, RecordingRef, Session, sanitize_title};

pub use error::{RecordingError, SESSION_TOKEN_GUIDANCE};
pub use record::MetadataRecord;

use postprocess::{ArchiveOutcome, process_archive, process_captions};
use staging::{
    ARCHIVE_FILE, CAPTIONS_FILE, StagingPaths, VIDEO_FILE, clear_managed, has_entries, promote,
    remove_quietly,
};

/// Per-call options for [`Downloader::download`].
#[derive(Clone)]
pub struct RecordingOptions {
    /// Base directory; the recording directory is created inside it.
    pub output_dir: PathBuf,
    /// Explicit session token; overrides the URL's `session` parameter.
    pub session: Option<String>,
    /// Replace the managed files of an existing directory instead of failing.
    pub overwrite: bool,
    /// Byte progress of the video download.
    pub progress: Option<ProgressCallback>,
    /// Subtitle muxer; embedding is skipped when absent.
    pub embedder: Option<Arc<dyn SubtitleEmbedder>>,
}

impl fmt::Debug for RecordingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingOptions")
            .field("output_dir", &self.output_dir)
            .field("has_session", &self.session.is_some())
            .field("overwrite", &self.overwrite)
            .field("has_progress", &self.progress.is_some())
            .field("has_embedder", &self.embedder.is_some())
            .finish()
    }
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self::new(".")
    }
}

impl RecordingOptions {
    /// Options writing into `output_dir`, no session, no overwrite.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            session: None,
            overwrite: false,
            progress: None,
            embedder: None,
        }
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Sets overwrite.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Sets the video progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets the subtitle embedder.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn SubtitleEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

/// What a successful download produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingResult {
    /// Sanitized title; also the directory name.
    pub title: String,
    /// The recording directory.
    pub root_dir: PathBuf,
    /// `recording.mp4`, when the video was downloaded.
    pub video_path: Option<PathBuf>,
    /// `raw.zip`, when the archive was downloaded.
    pub archive_path: Option<PathBuf>,
    /// `raw/`, when the archive was extracted.
    pub extracted_dir: Option<PathBuf>,
    /// Non-fatal problems, in the order they occurred.
    pub warnings: Vec<String>,
}

/// Values shared by every stage of one recording.
#[derive(Debug)]
pub(crate) struct RecordingContext {
    pub recording: RecordingRef,
    pub root: PathBuf,
    pub cookies: CookieSet,
    pub cancel: CancellationToken,
}

/// Downloads recordings, one call per recording.
///
/// Cheap to clone; clones share the dispatcher and extractor.
#[derive(Clone)]
pub struct Downloader {
    dispatcher: JobDispatcher,
    extractor: Arc<dyn MetadataExtractor>,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Runs jobs on local tasks.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self::with_dispatcher(JobDispatcher::Local(client))
    }

    /// Runs jobs on a shared, already started worker pool.
    #[must_use]
    pub fn with_pool(pool: Arc<WorkerPool>) -> Self {
        Self::with_dispatcher(JobDispatcher::Pool(pool))
    }

    /// Uses an explicit dispatcher.
    #[must_use]
    pub fn with_dispatcher(dispatcher: JobDispatcher) -> Self {
        Self {
            dispatcher,
            extractor: Arc::new(ConnectExtractor),
        }
    }

    /// Replaces the page/archive metadata extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Downloads one recording.
    ///
    /// # Errors
    ///
    /// - [`RecordingError::InvalidUrl`] if the URL has no host or id
    /// - [`RecordingError::AuthRequired`] if the page needs a session token
    /// - [`RecordingError::AlreadyExists`] if the directory holds files and
    ///   overwrite is off
    /// - [`RecordingError::NoAssets`] if neither video nor archive arrived
    /// - [`RecordingError::Io`] if the directory cannot be prepared
    /// - [`RecordingError::Cancelled`] if `cancel` fires
    #[instrument(skip(self, options, cancel), fields(url = %truncate_for_log(url, 80)))]
    pub async fn download(
        &self,
        url: &str,
        options: &RecordingOptions,
        cancel: &CancellationToken,
    ) -> Result<RecordingResult, RecordingError> {
        let recording = RecordingRef::parse(url)?;
        debug!(
            id = %recording.id(),
            host = %recording.hostname(),
            base = %recording.base_url(),
            "parsed recording URL"
        );

        let session = recording.resolve_session(options.session.as_deref());
        if let Some(session) = &session {
            debug!(length = session.len(), "using session token");
        }

        let staging = StagingPaths::new(&options.output_dir, recording.id());
        let archive_cancel = cancel.child_token();
        let archive_request = TransferRequest::new(
            recording.archive_url(),
            &staging.archive,
            TransferKind::Archive,
        )
        .with_cookies(CookieSet::from_session(session.as_ref()))
        .with_referer(recording.source_url());
        let archive_job =
            DownloadJob::transfer(JobKind::Archive, archive_request, archive_cancel.clone())
                .with_recording(recording.id());

        info!(url = %recording.archive_url(), "downloading recording archive");
        let (archive_handle, page) = tokio::join!(
            self.dispatcher.dispatch(archive_job),
            self.fetch_page(&recording, session.as_ref(), cancel),
        );

        let page = match page {
            Ok(page) => Some(page),
            Err(e) if e.kind() == ErrorKind::AuthRequired => {
                abort_archive(&archive_cancel, archive_handle, &staging.archive).await;
                return Err(RecordingError::AuthRequired { source: e });
            }
            Err(e) => {
                warn!(error = %e, "page metadata unavailable, continuing without it");
                None
            }
        };

        if cancel.is_cancelled() {
            abort_archive(&archive_cancel, archive_handle, &staging.archive).await;
            return Err(RecordingError::Cancelled);
        }

        let title = page
            .as_ref()
            .and_then(|p| p.title.as_deref())
            .filter(|t| !t.trim().is_empty())
            .map_or_else(|| sanitize_title(recording.id()), sanitize_title);
        info!(title = %title, "resolved title");

        let root = options.output_dir.join(&title);
        if let Err(e) = prepare_root(&root, options.overwrite).await {
            abort_archive(&archive_cancel, archive_handle, &staging.archive).await;
            return Err(e);
        }

        let page_cookies = page.as_ref().map(|p| p.cookies.clone()).unwrap_or_default();
        let ctx = RecordingContext {
            cookies: CookieSet::merged(session.as_ref(), page_cookies),
            recording,
            root,
            cancel: cancel.clone(),
        };
        debug!(count = ctx.cookies.len(), "prepared cookies");

        let video_handle = match page.as_ref().and_then(|p| p.video_src.as_deref()) {
            Some(src) => Some(self.start_video(&ctx, src, &staging.video, options).await),
            None => None,
        };

        let mut result = RecordingResult {
            title,
            root_dir: ctx.root.clone(),
            ..RecordingResult::default()
        };

        let archive_outcome = archive_handle.wait().await;
        let archive_path =
            settle_archive(archive_outcome, &staging.archive, &ctx.root, &mut result.warnings)
                .await;
        result.archive_path.clone_from(&archive_path);

        let archive_stage = async {
            match &archive_path {
                Some(path) => {
                    process_archive(&self.dispatcher, Arc::clone(&self.extractor), &ctx, path).await
                }
                None => ArchiveOutcome::default(),
            }
        };
        let video_stage = settle_video(video_handle, &staging.video, &ctx.root);
        let (archive, video_path) = tokio::join!(archive_stage, video_stage);

        if cancel.is_cancelled() {
            remove_quietly(&staging.video).await;
            return Err(RecordingError::Cancelled);
        }

        result.extracted_dir = archive.extracted_dir;
        result.warnings.extend(archive.warnings);
        result.video_path.clone_from(&video_path);
        if video_path.is_none() {
            result.warnings.push("Video rendition not available".to_string());
        }

        let embedder = options.embedder.as_deref();
        if let Some(captions) = &archive.captions {
            process_captions(captions, video_path.as_deref(), &ctx.root, &archive.names, embedder)
                .await;
        } else if let (Some(video), Some(caption_path)) = (
            video_path.as_deref(),
            page.as_ref().and_then(|p| p.caption_path.as_deref()),
        ) && let Some(captions) = self.fetch_captions(&ctx, caption_path).await
        {
            process_captions(&captions, Some(video), &ctx.root, &archive.names, embedder).await;
        }

        if result.video_path.is_none() && result.archive_path.is_none() {
            return Err(RecordingError::NoAssets);
        }

        if let Err(e) = MetadataRecord::new(&ctx.recording, &result)
            .write(&ctx.root)
            .await
        {
            warn!(error = %e, "metadata write failed");
            result.warnings.push(format!("write metadata: {e}"));
        }

        info!(
            title = %result.title,
            video = result.video_path.is_some(),
            archive = result.archive_path.is_some(),
            warnings = result.warnings.len(),
            "recording complete"
        );
        Ok(result)
    }

    async fn fetch_page(
        &self,
        recording: &RecordingRef,
        session: Option<&Session>,
        cancel: &CancellationToken,
    ) -> Result<PageMetadata, TransferError> {
        let PageResponse { body, cookies } = self
            .dispatcher
            .client()
            .fetch_page(recording.source_url(), session, cancel)
            .await?;
        let mut page = self.extractor.page(&body);
        page.cookies = cookies;
        debug!(
            title = ?page.title,
            video = page.video_src.is_some(),
            captions = page.caption_path.is_some(),
            "page metadata extracted"
        );
        Ok(page)
    }

    async fn start_video(
        &self,
        ctx: &RecordingContext,
        src: &str,
        staged: &Path,
        options: &RecordingOptions,
    ) -> JobHandle {
        info!(url = %truncate_for_log(src, 80), "downloading video");
        let request = TransferRequest::new(src, staged, TransferKind::Video)
            .with_cookies(ctx.cookies.clone())
            .with_referer(ctx.recording.source_url());
        let job = DownloadJob::transfer(JobKind::Video, request, ctx.cancel.clone())
            .with_recording(ctx.recording.id())
            .with_progress(options.progress.clone());
        self.dispatcher.dispatch(job).await
    }

    /// Downloads the caption track referenced by the page.
    async fn fetch_captions(&self, ctx: &RecordingContext, caption_path: &str) -> Option<PathBuf> {
        let url = ctx.recording.resolve_caption_url(caption_path);
        let target = ctx.root.join(CAPTIONS_FILE);
        info!(url = %url, "downloading captions");
        let request = TransferRequest::new(url, &target, TransferKind::Binary)
            .with_cookies(ctx.cookies.clone())
            .with_referer(ctx.recording.source_url());
        let job = DownloadJob::transfer(JobKind::Caption, request, ctx.cancel.clone())
            .with_recording(ctx.recording.id());
        match self.dispatcher.dispatch(job).await.wait().await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "caption download failed");
                remove_quietly(&target).await;
                None
            }
        }
    }
}

/// Applies the existing-directory policy and creates the directory.
async fn prepare_root(root: &Path, overwrite: bool) -> Result<(), RecordingError> {
    if has_entries(root).await {
        if !overwrite {
            return Err(RecordingError::AlreadyExists {
                path: root.to_path_buf(),
            });
        }
        debug!(path = %root.display(), "clearing previous download");
        clear_managed(root)
            .await
            .map_err(|e| RecordingError::io(root, e))?;
    }
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| RecordingError::io(root, e))
}

/// Cancels the in-flight archive, waits for it to stop and drops its file.
async fn abort_archive(cancel: &CancellationToken, handle: JobHandle, staged: &Path) {
    cancel.cancel();
    let _ = handle.wait().await;
    remove_quietly(staged).await;
}

/// Moves a downloaded archive into place, or records why there is none.
async fn settle_archive(
    outcome: Result<PathBuf, JobError>,
    staged: &Path,
    root: &Path,
    warnings: &mut Vec<String>,
) -> Option<PathBuf> {
    match outcome {
        Ok(_) => {
            let target = root.join(ARCHIVE_FILE);
            match promote(staged, &target).await {
                Ok(()) => {
                    info!(path = %target.display(), "archive downloaded");
                    Some(target)
                }
                Err(e) => {
                    warn!(error = %e, "archive move failed");
                    remove_quietly(staged).await;
                    warnings.push(format!("Raw recording archive download failed: {e}"));
                    None
                }
            }
        }
        Err(e) => {
            remove_quietly(staged).await;
            let warning = match e.kind() {
                ErrorKind::NotFound => "Raw recording archive not available".to_string(),
                ErrorKind::InvalidContent => {
                    "Archive response was invalid (invalid content)".to_string()
                }
                _ => format!("Raw recording archive download failed: {e}"),
            };
            warn!(error = %e, "archive unavailable");
            warnings.push(warning);
            None
        }
    }
}

/// Waits for the video and moves it into place.
async fn settle_video(handle: Option<JobHandle>, staged: &Path, root: &Path) -> Option<PathBuf> {
    let handle = handle?;
    if let Err(e) = handle.wait().await {
        warn!(error = %e, "video download failed");
        remove_quietly(staged).await;
        return None;
    }
    let target = root.join(VIDEO_FILE);
    match promote(staged, &target).await {
        Ok(()) => {
            info!(path = %target.display(), "video downloaded");
            Some(target)
        }
        Err(e) => {
            warn!(error = %e, "video move failed");
            remove_quietly(staged).await;
            None
        }
    }
}
