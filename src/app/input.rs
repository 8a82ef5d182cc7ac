//! Assembly of the recording URL list from arguments, a URL file and stdin.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use connectdl_core::dedupe_urls;

use crate::cli::Args;

/// Collects URLs from positional arguments and `--file`; piped stdin is read
/// only when neither is given. The result is de-duplicated in input order.
pub(crate) fn collect_urls(args: &Args) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();

    if let Some(path) = args.url_file.as_deref() {
        urls.extend(read_url_file(path)?);
    }

    if urls.is_empty() && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        urls.extend(parse_url_lines(&buffer));
    }

    let urls = dedupe_urls(urls);
    if urls.is_empty() {
        bail!("No URLs provided. Pass recording URLs as arguments or use --file/-f");
    }
    Ok(urls)
}

fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read URLs from '{}'", path.display()))?;
    Ok(parse_url_lines(&raw))
}

/// One URL per line; blank lines and `#` comments are skipped.
pub(crate) fn parse_url_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}
