//! Subtitle embedding through the external MP4Box tool.
//!
//! MP4Box is much smaller than FFmpeg and enough to add a WebVTT track
//! (converted to TX3G) to an MP4 in place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Environment variable naming an MP4Box binary.
pub const MP4BOX_ENV: &str = "CONNECTDL_MP4BOX";

/// Errors from subtitle embedding.
#[derive(Debug, Error)]
pub enum MuxError {
    /// No binary could be located.
    #[error(
        "MP4Box not found; set {MP4BOX_ENV}, pass --mp4box, or install MP4Box (GPAC) on PATH"
    )]
    NotFound,

    /// An input file is missing.
    #[error("{what} file not found: {path}")]
    MissingInput {
        /// "video" or "caption".
        what: &'static str,
        /// The missing path.
        path: PathBuf,
        /// The lookup error.
        #[source]
        source: std::io::Error,
    },

    /// The tool could not be spawned or its scratch directory created.
    #[error("failed to run MP4Box at {binary}: {source}")]
    Spawn {
        /// Binary path.
        binary: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported failure.
    #[error("MP4Box exited with {status}\nstderr: {stderr}")]
    Failed {
        /// Exit status description.
        status: String,
        /// Captured stderr.
        stderr: String,
    },
}

/// Adds a caption track to a video file in place.
#[async_trait]
pub trait SubtitleEmbedder: Send + Sync {
    /// Embeds `captions` into `video` with the given language tag.
    async fn embed_subtitles(&self, video: &Path, captions: &Path, lang: &str)
    -> Result<(), MuxError>;
}

/// [`SubtitleEmbedder`] backed by the MP4Box binary.
#[derive(Debug, Clone)]
pub struct Mp4BoxEmbedder {
    binary: PathBuf,
}

impl Mp4BoxEmbedder {
    /// Uses an explicit binary path.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locates MP4Box: explicit path, then `CONNECTDL_MP4BOX`, then `MP4Box`
    /// (and `mp4box` outside Windows) on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::NotFound`] if no candidate exists.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, MuxError> {
        if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
            return Ok(Self::new(path));
        }
        if let Some(env_path) = std::env::var_os(MP4BOX_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(env_path));
        }
        if let Ok(found) = which::which("MP4Box") {
            return Ok(Self::new(found));
        }
        if !cfg!(windows)
            && let Ok(found) = which::which("mp4box")
        {
            return Ok(Self::new(found));
        }
        Err(MuxError::NotFound)
    }

    /// Binary in use.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl SubtitleEmbedder for Mp4BoxEmbedder {
    async fn embed_subtitles(
        &self,
        video: &Path,
        captions: &Path,
        lang: &str,
    ) -> Result<(), MuxError> {
        let lang = if lang.is_empty() { "en" } else { lang };
        let video = tokio::fs::canonicalize(video)
            .await
            .map_err(|source| MuxError::MissingInput {
                what: "video",
                path: video.to_path_buf(),
                source,
            })?;
        let captions =
            tokio::fs::canonicalize(captions)
                .await
                .map_err(|source| MuxError::MissingInput {
                    what: "caption",
                    path: captions.to_path_buf(),
                    source,
                })?;

        // Concurrent MP4Box runs collide on their temp output names unless
        // each gets its own scratch directory.
        let scratch = tempfile::Builder::new()
            .prefix("mp4box-")
            .tempdir()
            .map_err(|source| MuxError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let track = format!("{}:lang={lang}:@vtt2tx3g", captions.display());
        debug!(binary = %self.binary.display(), track = %track, "running MP4Box");
        let output = Command::new(&self.binary)
            .arg("-add")
            .arg(&track)
            .arg("-tmp")
            .arg(scratch.path())
            .arg(&video)
            .current_dir(scratch.path())
            .output()
            .await
            .map_err(|source| MuxError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(MuxError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(video = %video.display(), "subtitles embedded");
        Ok(())
    }
}
