//! Work done on an extracted archive and on the caption track.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::RecordingContext;
use super::staging::{
    CAPTIONS_FILE, CHAT_LOG_FILE, DOCUMENTS_DIR, DOCUMENTS_INDEX_FILE, EXTRACTED_DIR,
    TRANSCRIPT_FILE,
};
use crate::captions::{
    SpeakerNames, chat_log, clean_caption_text, render_document_index, render_transcript,
};
use crate::download::{TransferKind, TransferRequest};
use crate::metadata::{ArchiveInsights, MetadataExtractor};
use crate::mux::SubtitleEmbedder;
use crate::pool::{DownloadJob, JobDispatcher};
use crate::recording::sanitize_title;

/// What the archive stage produced.
#[derive(Debug, Default)]
pub(crate) struct ArchiveOutcome {
    pub extracted_dir: Option<PathBuf>,
    pub captions: Option<PathBuf>,
    pub names: SpeakerNames,
    pub warnings: Vec<String>,
}

/// Extracts the archive into `raw/`, then derives captions, the document
/// index, the documents themselves and the chat log from it.
pub(crate) async fn process_archive(
    dispatcher: &JobDispatcher,
    extractor: Arc<dyn MetadataExtractor>,
    ctx: &RecordingContext,
    archive: &Path,
) -> ArchiveOutcome {
    let extract_dir = ctx.root.join(EXTRACTED_DIR);
    info!(path = %archive.display(), "extracting archive");
    let job = DownloadJob::extract(archive, &extract_dir, ctx.cancel.clone())
        .with_recording(ctx.recording.id());
    if let Err(e) = dispatcher.dispatch(job).await.wait().await {
        warn!(path = %archive.display(), error = %e, "archive extraction failed");
        return ArchiveOutcome {
            warnings: vec![format!("Archive extraction failed: {e}")],
            ..ArchiveOutcome::default()
        };
    }
    info!(path = %extract_dir.display(), "archive extracted");

    let root = ctx.root.clone();
    let dir = extract_dir.clone();
    let hostname = ctx.recording.hostname().to_string();
    let scanned = tokio::task::spawn_blocking(move || {
        let captions = copy_first_caption(&dir, &root);
        let insights = extractor.archive(&dir, &hostname);
        if let Some(name) = &insights.lecturer_name {
            debug!(name = %name, "lecturer name found");
        }
        if !insights.documents.is_empty() {
            let index = root.join(DOCUMENTS_INDEX_FILE);
            match std::fs::write(&index, render_document_index(&insights.documents)) {
                Ok(()) => debug!(path = %index.display(), count = insights.documents.len(), "document list written"),
                Err(e) => warn!(path = %index.display(), error = %e, "document list write failed"),
            }
        }
        (captions, insights)
    })
    .await;

    let (captions, insights) = match scanned {
        Ok(scanned) => scanned,
        Err(e) => {
            warn!(error = %e, "archive scan task failed");
            (None, ArchiveInsights::default())
        }
    };

    download_documents(dispatcher, ctx, &insights).await;
    write_chat_log(&extract_dir, &ctx.root).await;

    ArchiveOutcome {
        extracted_dir: Some(extract_dir),
        captions,
        names: SpeakerNames::from(&insights),
        warnings: Vec::new(),
    }
}

async fn download_documents(
    dispatcher: &JobDispatcher,
    ctx: &RecordingContext,
    insights: &ArchiveInsights,
) {
    if insights.documents.is_empty() {
        return;
    }
    let docs_dir = ctx.root.join(DOCUMENTS_DIR);
    let file_names = unique_file_names(insights.documents.iter().map(|doc| doc.name.as_str()));
    let documents: Vec<(String, TransferRequest)> = insights
        .documents
        .iter()
        .zip(file_names)
        .map(|(doc, file_name)| {
            let request =
                TransferRequest::new(&doc.url, docs_dir.join(file_name), TransferKind::Binary)
                    .with_cookies(ctx.cookies.clone())
                    .with_referer(ctx.recording.source_url());
            (doc.name.clone(), request)
        })
        .collect();

    let total = documents.len();
    info!(count = total, "downloading documents");
    let downloaded = dispatcher.download_documents(documents, &ctx.cancel).await;
    info!(downloaded, total, "documents downloaded");
}

/// Sanitizes document names and numbers repeats (`name (2).pdf`) so no two
/// documents share a destination. Comparison ignores case.
fn unique_file_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let base = sanitize_title(name);
            let mut candidate = base.clone();
            let mut counter = 2;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = numbered(&base, counter);
                counter += 1;
            }
            candidate
        })
        .collect()
}

fn numbered(name: &str, counter: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({counter}).{ext}"),
        _ => format!("{name} ({counter})"),
    }
}

async fn write_chat_log(extract_dir: &Path, root: &Path) {
    let dir = extract_dir.to_path_buf();
    let target = root.join(CHAT_LOG_FILE);
    let written = tokio::task::spawn_blocking(move || {
        let log = chat_log(&dir)?;
        std::fs::write(&target, log)?;
        Ok::<_, std::io::Error>(target)
    })
    .await;
    match written {
        Ok(Ok(path)) => debug!(path = %path.display(), "chat log created"),
        Ok(Err(e)) => debug!(error = %e, "chat log not created"),
        Err(e) => warn!(error = %e, "chat log task failed"),
    }
}

/// Copies the first `*.vtt` of the extracted root to `captions.vtt`.
fn copy_first_caption(extract_dir: &Path, root: &Path) -> Option<PathBuf> {
    let mut tracks: Vec<PathBuf> = std::fs::read_dir(extract_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "vtt"))
        .collect();
    tracks.sort();
    let source = tracks.into_iter().next()?;

    let target = root.join(CAPTIONS_FILE);
    match std::fs::copy(&source, &target) {
        Ok(_) => {
            debug!(source = %source.display(), "caption track found in archive");
            Some(target)
        }
        Err(e) => {
            warn!(source = %source.display(), error = %e, "caption copy failed");
            None
        }
    }
}

/// Replaces speaker markers in the caption file, writes the transcript and
/// embeds the track into the video. Every step failing is logged only.
pub(crate) async fn process_captions(
    captions: &Path,
    video: Option<&Path>,
    root: &Path,
    names: &SpeakerNames,
    embedder: Option<&dyn SubtitleEmbedder>,
) {
    let raw = match tokio::fs::read_to_string(captions).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %captions.display(), error = %e, "caption file unreadable");
            return;
        }
    };

    let cleaned = clean_caption_text(&raw, names);
    if let Err(e) = tokio::fs::write(captions, &cleaned).await {
        warn!(path = %captions.display(), error = %e, "caption cleaning failed");
    }

    let transcript = render_transcript(&cleaned, names);
    if !transcript.is_empty() {
        let path = root.join(TRANSCRIPT_FILE);
        match tokio::fs::write(&path, transcript).await {
            Ok(()) => debug!(path = %path.display(), "transcript created"),
            Err(e) => warn!(path = %path.display(), error = %e, "transcript write failed"),
        }
    }

    if let (Some(embedder), Some(video)) = (embedder, video) {
        info!(path = %captions.display(), "embedding subtitles");
        if let Err(e) = embedder.embed_subtitles(video, captions, "en").await {
            warn!(error = %e, "failed to embed subtitles");
        }
    }
}
