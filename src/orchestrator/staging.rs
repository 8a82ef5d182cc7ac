//! Staging paths and the managed files of a recording directory.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Final video file name.
pub const VIDEO_FILE: &str = "recording.mp4";
/// Final archive file name.
pub const ARCHIVE_FILE: &str = "raw.zip";
/// Extracted archive directory.
pub const EXTRACTED_DIR: &str = "raw";
/// Caption track.
pub const CAPTIONS_FILE: &str = "captions.vtt";
/// Readable transcript.
pub const TRANSCRIPT_FILE: &str = "transcript.txt";
/// Chat messages.
pub const CHAT_LOG_FILE: &str = "chat_log.txt";
/// Downloaded documents.
pub const DOCUMENTS_DIR: &str = "documents";
/// Document index.
pub const DOCUMENTS_INDEX_FILE: &str = "documents.txt";
/// Download record.
pub const METADATA_FILE: &str = "metadata.json";

const MANAGED_FILES: [&str; 7] = [
    VIDEO_FILE,
    ARCHIVE_FILE,
    CAPTIONS_FILE,
    TRANSCRIPT_FILE,
    CHAT_LOG_FILE,
    DOCUMENTS_INDEX_FILE,
    METADATA_FILE,
];

const MANAGED_DIRS: [&str; 2] = [EXTRACTED_DIR, DOCUMENTS_DIR];

/// Hidden per-recording paths in the base output directory.
#[derive(Debug, Clone)]
pub(crate) struct StagingPaths {
    pub archive: PathBuf,
    pub video: PathBuf,
}

impl StagingPaths {
    pub(crate) fn new(base_dir: &Path, recording_id: &str) -> Self {
        Self {
            archive: base_dir.join(format!(".{recording_id}_temp.zip")),
            video: base_dir.join(format!(".{recording_id}_temp.mp4")),
        }
    }
}

/// Moves a staged file into place, copying across filesystems.
pub(crate) async fn promote(staged: &Path, target: &Path) -> io::Result<()> {
    if tokio::fs::rename(staged, target).await.is_ok() {
        return Ok(());
    }
    debug!(from = %staged.display(), to = %target.display(), "rename failed, copying");
    tokio::fs::copy(staged, target).await?;
    remove_quietly(staged).await;
    Ok(())
}

/// Removes a file, ignoring errors (usually: it was never written).
pub(crate) async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "failed to remove file");
    }
}

/// True when `dir` exists and holds at least one entry.
pub(crate) async fn has_entries(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

/// Deletes the artifacts a previous run may have left in `root`.
///
/// Unrelated files are kept.
pub(crate) async fn clear_managed(root: &Path) -> io::Result<()> {
    for name in MANAGED_FILES {
        match tokio::fs::remove_file(root.join(name)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
    }
    for name in MANAGED_DIRS {
        match tokio::fs::remove_dir_all(root.join(name)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
    }
    Ok(())
}
