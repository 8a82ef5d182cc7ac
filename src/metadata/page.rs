//! Recording page parsing.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{Html, Selector};
use tracing::debug;

use super::PageMetadata;

#[allow(clippy::expect_used)]
static CAS_RECORDING_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var\s+casRecordingURL\s*=\s*'([^']+)'").expect("casRecordingURL regex is valid")
});

#[allow(clippy::expect_used)]
static TRANSCRIPT_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"var\s+transcriptFilename\s*=\s*'([^']+\.vtt)'")
        .expect("transcriptFilename regex is valid")
});

#[allow(clippy::expect_used)]
static QUOTED_VTT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"](/[^'"]+\.vtt)['"]"#).expect("quoted vtt path regex is valid")
});

#[allow(clippy::expect_used)]
static JS_HEX_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\x([0-9a-fA-F]{2})").expect("hex escape regex is valid"));

/// Extracts title, video URL and caption path from a recording page.
///
/// The signed stream URL in the page script is preferred over `<video src>`.
/// Captions come from `<track src>`, else from the page script.
#[must_use]
pub fn parse_page(body: &[u8]) -> PageMetadata {
    let html = String::from_utf8_lossy(body);
    let doc = Html::parse_document(&html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let video_element_src = last_attr(&doc, "video[src]", "src");
    let track_src = last_attr(&doc, "track[src]", "src");

    let video_src = CAS_RECORDING_URL
        .captures(&html)
        .map(|c| c[1].to_string())
        .or(video_element_src);

    let caption_path = track_src.or_else(|| caption_from_script(&html));

    debug!(
        has_title = title.is_some(),
        has_video = video_src.is_some(),
        has_captions = caption_path.is_some(),
        "page parsed"
    );

    PageMetadata {
        title,
        video_src,
        caption_path,
        cookies: Vec::new(),
    }
}

fn last_attr(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .filter(|v| !v.is_empty())
        .last()
        .map(str::to_string)
}

fn caption_from_script(html: &str) -> Option<String> {
    if let Some(c) = TRANSCRIPT_FILENAME.captures(html) {
        return Some(unescape_js(&c[1]));
    }
    QUOTED_VTT_PATH.captures(html).map(|c| c[1].to_string())
}

/// Decodes `\xNN` escapes written by the page script.
fn unescape_js(value: &str) -> String {
    JS_HEX_ESCAPE
        .replace_all(value, |c: &Captures<'_>| {
            u8::from_str_radix(&c[1], 16)
                .map(|b| char::from(b).to_string())
                .unwrap_or_else(|_| c[0].to_string())
        })
        .into_owned()
}
