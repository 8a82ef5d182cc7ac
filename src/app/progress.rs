//! Terminal progress bars and per-recording status lines.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use connectdl_core::{BatchObserver, ProgressCallback, RecordingError, RecordingResult};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{prefix:>7} {bar:30.cyan/blue} {bytes:>10}/{total_bytes:<10} {bytes_per_sec:>12} {msg}";

/// Shows one byte progress bar per recording video and prints a line when a
/// recording is saved.
#[derive(Debug)]
pub(crate) struct TerminalObserver {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    quiet: bool,
}

impl TerminalObserver {
    /// Bars are drawn to stderr when `visible`; `quiet` also drops the
    /// saved-recording lines.
    pub(crate) fn new(visible: bool, quiet: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
            quiet,
        }
    }

    fn take_bar(&self, url: &str) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
    }
}

impl BatchObserver for TerminalObserver {
    fn recording_started(&self, label: &str, url: &str) -> Option<ProgressCallback> {
        if self.multi.is_hidden() {
            return None;
        }
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix(label.to_string());
        bar.set_message("video");
        let replaced = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), bar.clone());
        if let Some(stale) = replaced {
            stale.finish_and_clear();
        }

        Some(Arc::new(move |downloaded, total| {
            if total > 0 && bar.length() != Some(total) {
                bar.set_length(total);
            }
            bar.set_position(downloaded);
        }))
    }

    fn recording_skipped(&self, url: &str) {
        if let Some(bar) = self.take_bar(url) {
            bar.finish_and_clear();
        }
    }

    fn recording_finished(&self, url: &str, outcome: Result<&RecordingResult, &RecordingError>) {
        if let Some(bar) = self.take_bar(url) {
            bar.finish_and_clear();
        }
        if let Ok(result) = outcome
            && !self.quiet
        {
            let line = format!(
                "\x1b[32m\u{2713}\x1b[0m Saved recording \"{}\" to {}",
                result.title,
                result.root_dir.display()
            );
            if self.multi.is_hidden() {
                println!("{line}");
            } else {
                let _ = self.multi.println(line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_observer_returns_no_callback() {
        let observer = TerminalObserver::new(false, true);
        assert!(observer.recording_started("1/1", "https://h.test/a").is_none());
    }

    #[test]
    fn test_finished_without_bar_is_noop() {
        let observer = TerminalObserver::new(false, true);
        observer.recording_finished("https://h.test/a", Err(&RecordingError::NoAssets));
        assert!(observer.take_bar("https://h.test/a").is_none());
    }
}
