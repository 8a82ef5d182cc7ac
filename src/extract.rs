//! Recording archive extraction.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Errors raised while unpacking a recording archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive could not be opened or an entry could not be read.
    #[error("failed to read archive {archive}: {source}")]
    Archive {
        /// Archive path.
        archive: PathBuf,
        /// Underlying ZIP error.
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry would be written outside the destination directory.
    #[error("unsafe path in archive {archive}: {entry}")]
    UnsafePath {
        /// Archive path.
        archive: PathBuf,
        /// Raw entry name.
        entry: String,
    },

    /// Filesystem error while writing extracted files.
    #[error("IO error extracting to {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Extraction stopped because the token was cancelled.
    #[error("extraction of {archive} cancelled")]
    Cancelled {
        /// Archive path.
        archive: PathBuf,
    },

    /// The blocking extraction task panicked or was aborted.
    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ExtractError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Extracts `archive` into `dest`, rejecting entries that escape `dest`.
///
/// Runs on the blocking thread pool and checks `cancel` before each entry.
/// Returns the number of files written.
///
/// # Errors
///
/// Returns [`ExtractError`] if the archive is unreadable, contains a
/// path-traversal entry, or a file cannot be written, and
/// [`ExtractError::Cancelled`] once `cancel` fires.
pub async fn extract_archive(
    archive: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<usize, ExtractError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || extract_archive_blocking(&archive, &dest, &cancel))
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))?
}

fn extract_archive_blocking(
    archive_path: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<usize, ExtractError> {
    debug!(archive = %archive_path.display(), dest = %dest.display(), "extracting archive");
    let file = File::open(archive_path).map_err(|e| ExtractError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| ExtractError::Archive {
        archive: archive_path.to_path_buf(),
        source,
    })?;

    std::fs::create_dir_all(dest).map_err(|e| ExtractError::io(dest, e))?;

    let mut written = 0usize;
    for index in 0..archive.len() {
        if cancel.is_cancelled() {
            debug!(archive = %archive_path.display(), written, "extraction cancelled");
            return Err(ExtractError::Cancelled {
                archive: archive_path.to_path_buf(),
            });
        }
        let mut entry = archive.by_index(index).map_err(|source| ExtractError::Archive {
            archive: archive_path.to_path_buf(),
            source,
        })?;

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(ExtractError::UnsafePath {
                archive: archive_path.to_path_buf(),
                entry: entry.name().to_string(),
            });
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| ExtractError::io(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| ExtractError::io(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| ExtractError::io(&target, e))?;
        written += 1;
    }

    info!(archive = %archive_path.display(), files = written, "archive extracted");
    Ok(written)
}
