//! Text artifacts derived from captions and the session archive.
//!
//! All renderers are pure `&str -> String` functions; the orchestrator owns
//! the file I/O.

mod chat;
mod speakers;
mod transcript;

use std::fmt::Write as _;

use crate::metadata::DocumentLink;

pub use chat::{chat_log, format_milliseconds, render_chat_log};
pub use speakers::{SpeakerNames, clean_caption_text, clean_speaker_markers};
pub use transcript::render_transcript;

/// Renders the numbered `documents.txt` index.
#[must_use]
pub fn render_document_index(documents: &[DocumentLink]) -> String {
    let mut out = String::from("LECTURE DOCUMENTS\n=================\n\n");
    for (index, doc) in documents.iter().enumerate() {
        let size_kb = (doc.size / 1024).max(1);
        let _ = writeln!(out, "{}. {} ({size_kb} KB)", index + 1, doc.name);
        let _ = writeln!(out, "   URL: {}\n", doc.url);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_document_index() {
        let docs = vec![
            DocumentLink {
                name: "a.pdf".to_string(),
                url: "https://h.test/a.pdf?download=true".to_string(),
                size: 10,
            },
            DocumentLink {
                name: "b.pptx".to_string(),
                url: "https://h.test/b.pptx?download=true".to_string(),
                size: 5 * 1024,
            },
        ];
        assert_eq!(
            render_document_index(&docs),
            "LECTURE DOCUMENTS\n=================\n\n\
             1. a.pdf (1 KB)\n   URL: https://h.test/a.pdf?download=true\n\n\
             2. b.pptx (5 KB)\n   URL: https://h.test/b.pptx?download=true\n\n"
        );
    }
}
