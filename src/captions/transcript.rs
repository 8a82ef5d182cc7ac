//! Plain-text transcript from a WebVTT caption file.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use super::speakers::{SpeakerNames, clean_speaker_markers};

#[allow(clippy::expect_used)]
static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}:\d{2}:\d{2})[.,]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}")
        .expect("cue timing regex is valid")
});

#[allow(clippy::expect_used)]
static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("inline tag regex is valid"));

/// Renders `[HH:MM:SS] text` lines, one per cue line.
///
/// Cue identifiers, inline tags and consecutive duplicate lines are dropped.
/// Returns an empty string when the captions contain no text.
#[must_use]
pub fn render_transcript(vtt: &str, names: &SpeakerNames) -> String {
    let mut out = String::new();
    let mut in_cue = false;
    let mut cue_start = "";
    let mut last_text = String::new();

    for (index, line) in vtt.lines().enumerate() {
        if index == 0 && line.starts_with("WEBVTT") {
            continue;
        }
        if let Some(timing) = CUE_TIMING.captures(line) {
            in_cue = true;
            cue_start = timing.get(1).map_or("", |m| m.as_str());
            continue;
        }
        if line.trim().is_empty() {
            in_cue = false;
            continue;
        }
        if !in_cue {
            continue;
        }

        let stripped = INLINE_TAG.replace_all(line.trim(), "");
        let text = clean_speaker_markers(&stripped, names);
        let text = text.trim();
        if text.is_empty() || text == last_text {
            continue;
        }

        if out.is_empty() {
            out.push_str("TRANSCRIPT\n==========\n\n");
        }
        let _ = writeln!(out, "[{cue_start}] {text}");
        last_text = text.to_string();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_transcript_basic() {
        let vtt = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\n<v Dana>Hello class</v>\n\n\
                   2\n00:01:05,500 --> 00:01:08.000\nHello class\n\n\
                   00:02:00.000 --> 00:02:03.000\n@:@User1@:@ Next topic\n";
        assert_eq!(
            render_transcript(vtt, &SpeakerNames::default()),
            "TRANSCRIPT\n==========\n\n[00:00:01] Hello class\n[00:02:00] Lecturer: Next topic\n"
        );
    }

    #[test]
    fn test_render_transcript_empty_captions() {
        assert_eq!(render_transcript("WEBVTT\n\n", &SpeakerNames::default()), "");
    }
}
