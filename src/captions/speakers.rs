//! Speaker marker replacement in caption text.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::metadata::ArchiveInsights;

#[allow(clippy::expect_used)]
static SPEAKER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@:@User(\d+)@:@").expect("speaker marker regex is valid"));

/// Names used to resolve `@:@UserN@:@` markers.
#[derive(Debug, Clone, Default)]
pub struct SpeakerNames {
    /// Presenter name; `User1` falls back to it.
    pub lecturer: Option<String>,
    /// `UserN` to full name.
    pub mapping: HashMap<String, String>,
}

impl From<&ArchiveInsights> for SpeakerNames {
    fn from(insights: &ArchiveInsights) -> Self {
        Self {
            lecturer: insights.lecturer_name.clone(),
            mapping: insights.user_mapping.clone(),
        }
    }
}

/// Replaces speaker markers with `Name:` labels and drops stray `@:@`.
///
/// Unmapped `User1` becomes the lecturer (or `Lecturer:`), other unmapped
/// users become `Speaker N:`.
#[must_use]
pub fn clean_speaker_markers(text: &str, names: &SpeakerNames) -> String {
    let replaced = SPEAKER_MARKER.replace_all(text, |c: &Captures<'_>| {
        let number = &c[1];
        if let Some(name) = names
            .mapping
            .get(&format!("User{number}"))
            .filter(|n| !n.is_empty())
        {
            return format!("{name}:");
        }
        if number == "1" {
            return match names.lecturer.as_deref().filter(|n| !n.is_empty()) {
                Some(lecturer) => format!("{lecturer}:"),
                None => "Lecturer:".to_string(),
            };
        }
        format!("Speaker {number}:")
    });
    replaced.replace("@:@", "")
}

/// Applies [`clean_speaker_markers`] to every line of a caption file.
#[must_use]
pub fn clean_caption_text(vtt: &str, names: &SpeakerNames) -> String {
    let mut out = String::with_capacity(vtt.len());
    for line in vtt.lines() {
        let _ = writeln!(out, "{}", clean_speaker_markers(line, names));
    }
    out
}
