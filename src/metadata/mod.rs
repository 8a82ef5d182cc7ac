//! Metadata extraction from the recording page and the extracted archive.
//!
//! Extraction is pure: it reads bytes or files and never touches the
//! network. The orchestrator depends only on the [`MetadataExtractor`] trait.

mod archive;
mod page;

use std::collections::HashMap;
use std::path::Path;

use crate::recording::Cookie;

pub use archive::{
    convert_to_direct_download_url, document_links, lecturer_name, user_mapping,
};
pub use page::parse_page;

/// What the recording page tells us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    /// `<title>` text, trimmed.
    pub title: Option<String>,
    /// Playable video URL (signed stream URL or `<video src>`).
    pub video_src: Option<String>,
    /// Caption track reference as written in the page.
    pub caption_path: Option<String>,
    /// Cookies set by the page response.
    pub cookies: Vec<Cookie>,
}

/// A document shared during the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    /// File name as shown in the session.
    pub name: String,
    /// Direct download URL.
    pub url: String,
    /// Size in bytes (0 when unknown).
    pub size: u64,
}

/// What the extracted session archive tells us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveInsights {
    /// Presenter name, when it can be recovered.
    pub lecturer_name: Option<String>,
    /// Anonymous participant id (`User7`) to real name.
    pub user_mapping: HashMap<String, String>,
    /// Shared documents, sorted by name.
    pub documents: Vec<DocumentLink>,
}

/// Pluggable page/archive metadata extraction.
pub trait MetadataExtractor: Send + Sync {
    /// Extracts title, video URL and caption path from a page body.
    fn page(&self, body: &[u8]) -> PageMetadata;

    /// Reads lecturer, participant names and documents from an extracted
    /// archive directory. Blocking; call from a blocking context.
    fn archive(&self, dir: &Path, hostname: &str) -> ArchiveInsights;
}

/// Extractor for the page and archive layout produced by Adobe Connect.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectExtractor;

impl MetadataExtractor for ConnectExtractor {
    fn page(&self, body: &[u8]) -> PageMetadata {
        parse_page(body)
    }

    fn archive(&self, dir: &Path, hostname: &str) -> ArchiveInsights {
        ArchiveInsights {
            lecturer_name: lecturer_name(dir),
            user_mapping: user_mapping(dir),
            documents: document_links(dir, hostname),
        }
    }
}
