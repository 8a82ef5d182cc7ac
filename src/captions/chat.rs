//! Chat log from the archive's transcript stream.

use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static ICON_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<iconType><!\[CDATA\[([^\]]+)\]\]></iconType>").expect("iconType regex is valid")
});

#[allow(clippy::expect_used)]
static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<label><!\[CDATA\[([^\]]*)\]\]></label>").expect("label regex is valid")
});

#[allow(clippy::expect_used)]
static SENDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<name><!\[CDATA\[([^\]]*)\]\]></name>").expect("name regex is valid")
});

#[allow(clippy::expect_used)]
static TIME_MS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<time><!\[CDATA\[(\d+)\]\]></time>").expect("time regex is valid")
});

/// Formats a millisecond offset as `HH:MM:SS`.
#[must_use]
pub fn format_milliseconds(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Renders chat messages from `transcriptstream.xml` content.
///
/// Fields are tracked line by line; a closing `</Object>` emits the current
/// message when it is a chat entry with a non-empty text.
#[must_use]
pub fn render_chat_log(transcript_xml: &str) -> String {
    let mut out = String::from("CHAT LOG\n========\n\n");
    let mut icon_type = String::new();
    let mut label = String::new();
    let mut sender = String::new();
    let mut time_ms = 0u64;

    for line in transcript_xml.lines() {
        if let Some(c) = ICON_TYPE.captures(line) {
            icon_type = c[1].to_string();
        }
        if let Some(c) = LABEL.captures(line) {
            label = c[1].to_string();
        }
        if let Some(c) = SENDER.captures(line) {
            sender = c[1].to_string();
        }
        if let Some(ms) = TIME_MS.captures(line).and_then(|c| c[1].parse().ok()) {
            time_ms = ms;
        }

        if line.contains("</Object>") && icon_type == "chat" && !label.is_empty() {
            let stamp = format_milliseconds(time_ms);
            if sender.is_empty() {
                let _ = writeln!(out, "[{stamp}] {label}");
            } else {
                let _ = writeln!(out, "[{stamp}] {sender}: {label}");
            }
            icon_type.clear();
            label.clear();
            sender.clear();
        }
    }

    out
}

/// Reads `transcriptstream.xml` from an extracted archive and renders the chat log.
///
/// # Errors
///
/// Returns the read error when the stream file is missing or unreadable.
pub fn chat_log(extracted_dir: &Path) -> io::Result<String> {
    let content = std::fs::read_to_string(extracted_dir.join("transcriptstream.xml"))?;
    Ok(render_chat_log(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_milliseconds() {
        assert_eq!(format_milliseconds(0), "00:00:00");
        assert_eq!(format_milliseconds(3_725_999), "01:02:05");
    }

    #[test]
    fn test_render_chat_log_emits_chat_objects_only() {
        let xml = "<Object>\n<iconType><![CDATA[chat]]></iconType>\n<label><![CDATA[Is this on the exam?]]></label>\n\
                   <name><![CDATA[Sam Lee]]></name>\n<time><![CDATA[65000]]></time>\n</Object>\n\
                   <Object>\n<iconType><![CDATA[stage]]></iconType>\n<label><![CDATA[joined]]></label>\n</Object>\n\
                   <Object>\n<iconType><![CDATA[chat]]></iconType>\n<label><![CDATA[anonymous note]]></label>\n\
                   <time><![CDATA[3600000]]></time>\n</Object>\n";
        assert_eq!(
            render_chat_log(xml),
            "CHAT LOG\n========\n\n[00:01:05] Sam Lee: Is this on the exam?\n[01:00:00] anonymous note\n"
        );
    }
}
