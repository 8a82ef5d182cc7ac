//! Reading presenter, participant and document data from an extracted archive.
//!
//! The archive is a directory of XML stream dumps. Only a handful of fields
//! matter, so they are pulled out with targeted patterns instead of a full
//! XML parse.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::DocumentLink;

#[allow(clippy::expect_used)]
static TECH_STAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Tech\s*[-–]?\s*([^\]]+)\]").expect("stage join regex is valid")
});

#[allow(clippy::expect_used)]
static LECTURER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Lecturer:\s*(?:<[^>]+>\s*)*([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)+)")
        .expect("lecturer label regex is valid")
});

#[allow(clippy::expect_used)]
static ANONYMOUS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<anonymousName><!\[CDATA\[([^\]]+)\]\]></anonymousName>")
        .expect("anonymousName regex is valid")
});

#[allow(clippy::expect_used)]
static FULL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<fullName><!\[CDATA\[([^\]]*)\]\]></fullName>").expect("fullName regex is valid")
});

#[allow(clippy::expect_used)]
static NEW_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<newValue>(.*?)</newValue>").expect("newValue regex is valid")
});

#[allow(clippy::expect_used)]
static PLAYBACK_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<playbackFileName><!\[CDATA\[([^\]]+)\]\]></playbackFileName>")
        .expect("playbackFileName regex is valid")
});

#[allow(clippy::expect_used)]
static DOWNLOAD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<downloadUrl><!\[CDATA\[([^\]]+)\]\]></downloadUrl>")
        .expect("downloadUrl regex is valid")
});

#[allow(clippy::expect_used)]
static DOC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<name><!\[CDATA\[([^\]]+)\]\]></name>").expect("name regex is valid")
});

#[allow(clippy::expect_used)]
static DOC_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<size><!\[CDATA\[(\d+)\]\]></size>").expect("size regex is valid")
});

const SYSTEM_DOWNLOAD_MARKER: &str = "/system/download";

/// Files in `dir` whose names start with `prefix` and end with `suffix`, sorted.
fn matching_files(dir: &Path, prefix: &str, suffix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(suffix))
        })
        .collect();
    files.sort();
    files
}

/// Recovers the presenter's name.
///
/// Looks for the `[Tech - Name] ... has joined the stage` event first, then
/// for a `Lecturer: First Last` label in title pods.
#[must_use]
pub fn lecturer_name(dir: &Path) -> Option<String> {
    if let Ok(transcript) = fs::read_to_string(dir.join("transcriptstream.xml")) {
        let from_stage = transcript
            .lines()
            .filter(|line| line.contains("has joined the stage"))
            .find_map(|line| TECH_STAGE.captures(line).map(|c| c[1].trim().to_string()))
            .filter(|name| !name.is_empty());
        if from_stage.is_some() {
            return from_stage;
        }
    }

    matching_files(dir, "fttitle", ".xml")
        .into_iter()
        .filter_map(|path| fs::read_to_string(path).ok())
        .find_map(|content| {
            LECTURER_LABEL
                .captures(&content)
                .map(|c| c[1].trim().to_string())
        })
}

/// Maps anonymous participant ids (`User7`) to full names from `indexstream.xml`.
///
/// Ids and names are paired by order of appearance. Empty names are skipped
/// and a leading `Tech ` role prefix is removed.
#[must_use]
pub fn user_mapping(dir: &Path) -> HashMap<String, String> {
    let Ok(content) = fs::read_to_string(dir.join("indexstream.xml")) else {
        return HashMap::new();
    };

    let mapping: HashMap<String, String> = ANONYMOUS_NAME
        .captures_iter(&content)
        .zip(FULL_NAME.captures_iter(&content))
        .filter_map(|(anon, full)| {
            let name = full[1].strip_prefix("Tech ").unwrap_or(&full[1]).trim();
            (!name.is_empty()).then(|| (anon[1].to_string(), name.to_string()))
        })
        .collect();
    debug!(count = mapping.len(), "participant names mapped");
    mapping
}

/// Rewrites a `/system/download?download-url=<dir>&name=..` link into the
/// direct `<dir><encoded name>?download=true` path.
///
/// Links without a `download-url` parameter are returned unchanged.
#[must_use]
pub fn convert_to_direct_download_url(system_url: &str, file_name: &str) -> String {
    let Ok(base) = Url::parse("https://placeholder.invalid/") else {
        return system_url.to_string();
    };
    let Ok(parsed) = base.join(system_url) else {
        return system_url.to_string();
    };
    let Some(dir) = parsed
        .query_pairs()
        .find(|(key, _)| key == "download-url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
    else {
        return system_url.to_string();
    };
    format!("{dir}{}?download=true", urlencoding::encode(file_name))
}

/// Collects shared documents from the file-share pods (`ftfileshare*.xml`).
///
/// The archived playback link is preferred over the original upload link
/// because the latter often no longer resolves. Documents are unique by name
/// and returned sorted by name.
#[must_use]
pub fn document_links(dir: &Path, hostname: &str) -> Vec<DocumentLink> {
    let mut by_name: BTreeMap<String, (DocumentLink, bool)> = BTreeMap::new();

    for path in matching_files(dir, "ftfileshare", ".xml") {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        for block in NEW_VALUE.captures_iter(&content) {
            let block = &block[1];
            let Some(name) = DOC_NAME.captures(block).map(|c| c[1].to_string()) else {
                continue;
            };

            let playback = PLAYBACK_FILE_NAME
                .captures(block)
                .map(|c| c[1].to_string())
                .filter(|u| u.contains(SYSTEM_DOWNLOAD_MARKER));
            let has_playback = playback.is_some();
            let Some(system_url) = playback.or_else(|| {
                DOWNLOAD_URL
                    .captures(block)
                    .map(|c| c[1].to_string())
                    .filter(|u| u.contains(SYSTEM_DOWNLOAD_MARKER))
            }) else {
                continue;
            };

            let size = DOC_SIZE
                .captures(block)
                .and_then(|c| c[1].parse::<u64>().ok())
                .unwrap_or(0);
            let url = format!(
                "https://{hostname}{}",
                convert_to_direct_download_url(&system_url, &name)
            );

            match by_name.get_mut(&name) {
                None => {
                    by_name.insert(
                        name.clone(),
                        (DocumentLink { name, url, size }, has_playback),
                    );
                }
                Some((existing, existing_playback)) if has_playback && !*existing_playback => {
                    existing.url = url;
                    if size > 0 {
                        existing.size = size;
                    }
                    *existing_playback = true;
                }
                Some(_) => {}
            }
        }
    }

    let docs: Vec<DocumentLink> = by_name.into_values().map(|(doc, _)| doc).collect();
    debug!(count = docs.len(), "document links extracted");
    docs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lecturer_name_from_stage_event() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("transcriptstream.xml"),
            "<x>[Tech - Dana Reyes] has joined the stage</x>\n",
        )
        .unwrap();
        assert_eq!(lecturer_name(temp.path()).as_deref(), Some("Dana Reyes"));
    }

    #[test]
    fn test_lecturer_name_from_title_pod() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("fttitle12.xml"),
            "<text>Lecturer: <b><i>Alan Turing</i></b></text>",
        )
        .unwrap();
        assert_eq!(lecturer_name(temp.path()).as_deref(), Some("Alan Turing"));
        assert!(lecturer_name(&temp.path().join("missing")).is_none());
    }

    #[test]
    fn test_user_mapping_pairs_by_order() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("indexstream.xml"),
            "<u><anonymousName><![CDATA[User1]]></anonymousName><fullName><![CDATA[Tech Dana Reyes]]></fullName></u>\
             <u><anonymousName><![CDATA[User2]]></anonymousName><fullName><![CDATA[]]></fullName></u>\
             <u><anonymousName><![CDATA[User3]]></anonymousName><fullName><![CDATA[Sam Lee]]></fullName></u>",
        )
        .unwrap();
        let mapping = user_mapping(temp.path());
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["User1"], "Dana Reyes");
        assert_eq!(mapping["User3"], "Sam Lee");
    }

    #[test]
    fn test_convert_to_direct_download_url() {
        assert_eq!(
            convert_to_direct_download_url(
                "/system/download?download-url=/_a1/rec9/output/&name=Slides%201.pptx",
                "Slides 1.pptx"
            ),
            "/_a1/rec9/output/Slides%201.pptx?download=true"
        );
        assert_eq!(
            convert_to_direct_download_url("/system/download?name=x", "x"),
            "/system/download?name=x"
        );
    }

    #[test]
    fn test_document_links_prefers_playback_and_dedupes() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("ftfileshare3.xml"),
            "<newValue><name><![CDATA[notes.pdf]]></name><size><![CDATA[2048]]></size>\
             <downloadUrl><![CDATA[/system/download?download-url=/old/&name=notes.pdf]]></downloadUrl></newValue>\
             <newValue><name><![CDATA[notes.pdf]]></name>\
             <playbackFileName><![CDATA[/system/download?download-url=/_a/rec/output/&name=notes.pdf]]></playbackFileName></newValue>\
             <newValue><name><![CDATA[ignored.pdf]]></name><downloadUrl><![CDATA[/elsewhere/ignored.pdf]]></downloadUrl></newValue>",
        )
        .unwrap();
        fs::write(temp.path().join("other.xml"), "<newValue/>").unwrap();

        let docs = document_links(temp.path(), "meet.example.edu");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "notes.pdf");
        assert_eq!(
            docs[0].url,
            "https://meet.example.edu/_a/rec/output/notes.pdf?download=true"
        );
        assert_eq!(docs[0].size, 2048);
    }
}
