//! The `metadata.json` record written at the end of a download.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordingResult;
use super::staging::METADATA_FILE;
use crate::recording::RecordingRef;

/// Serialized summary of one completed download.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Resolved directory title.
    pub title: String,
    /// Page URL as given.
    pub source_url: String,
    /// Recording id.
    pub recording_id: String,
    /// Recording host.
    pub hostname: String,
    /// Final video path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
    /// Final archive path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    /// Extracted archive directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_dir: Option<PathBuf>,
    /// Completion time.
    pub downloaded_at: DateTime<Utc>,
    /// Non-fatal problems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl MetadataRecord {
    pub(crate) fn new(recording: &RecordingRef, result: &RecordingResult) -> Self {
        Self {
            title: result.title.clone(),
            source_url: recording.source_url().to_string(),
            recording_id: recording.id().to_string(),
            hostname: recording.hostname().to_string(),
            video_path: result.video_path.clone(),
            archive_path: result.archive_path.clone(),
            extracted_dir: result.extracted_dir.clone(),
            downloaded_at: Utc::now(),
            warnings: result.warnings.clone(),
        }
    }

    /// Writes the record as pretty JSON into `root/metadata.json`.
    pub(crate) async fn write(&self, root: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        tokio::fs::write(root.join(METADATA_FILE), json).await
    }
}
