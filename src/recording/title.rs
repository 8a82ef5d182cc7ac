//! Directory-safe recording titles.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of characters that are illegal in file names on common filesystems.
#[allow(clippy::expect_used)]
static ILLEGAL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1F]+"#).expect("title sanitizing regex is valid")
});

/// Fallback name when a title sanitizes to nothing.
const EMPTY_TITLE_FALLBACK: &str = "recording";

/// Turns a page title (or recording id) into a directory name.
///
/// Each run of illegal characters becomes one space and the result is trimmed,
/// including trailing dots, so `.` and `..` never name a directory.
#[must_use]
pub fn sanitize_title(raw: &str) -> String {
    let replaced = ILLEGAL_CHARS.replace_all(raw.trim(), " ");
    let trimmed = replaced.trim().trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        EMPTY_TITLE_FALLBACK.to_string()
    } else {
        trimmed.to_string()
    }
}
