//! Run summary printed on stdout.

use std::fmt::Write as _;
use std::time::Duration;

use connectdl_core::BatchSummary;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Renders the end-of-run summary.
pub(crate) fn render_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "\u{2501}".repeat(40));
    let fail_color = if summary.failed > 0 { RED } else { RESET };
    let _ = write!(
        out,
        "Download Summary: {GREEN}{} successful{RESET}, {fail_color}{} failed{RESET}",
        summary.successful, summary.failed
    );
    if summary.skipped > 0 {
        let _ = write!(out, ", {} skipped", summary.skipped);
    }
    out.push('\n');

    let _ = writeln!(out, "\nDownload Statistics:");
    let _ = writeln!(out, "  Total batch time: {}", format_elapsed(summary.elapsed));
    if summary.total_bytes > 0 {
        let _ = writeln!(out, "  Total data: {}", format_bytes(summary.total_bytes));
        let secs = summary.elapsed.as_secs_f64();
        if secs > 0.0 {
            let _ = writeln!(
                out,
                "  Average speed: {:.2} MB/s",
                as_f64(summary.total_bytes) / secs / 1024.0 / 1024.0
            );
        }
    }

    if !summary.failed_urls.is_empty() {
        let _ = writeln!(out, "\nFailed URLs:");
        for url in &summary.failed_urls {
            let _ = writeln!(out, "  {RED}\u{2717}{RESET} {url}");
        }
    }
    out
}

/// Binary-prefixed human readable size.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {prefix}B", as_f64(bytes) / as_f64(div))
}

fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.3}s", elapsed.as_secs_f64())
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: u64) -> f64 {
    value as f64
}
