//! Interactive overwrite confirmation on the terminal.

use std::io::{self, BufRead, Write};
use std::path::Path;

use async_trait::async_trait;
use connectdl_core::OverwritePrompt;
use tracing::debug;

/// Asks `Overwrite? [y/N]` on stdout and reads the answer from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TerminalPrompt;

#[async_trait]
impl OverwritePrompt for TerminalPrompt {
    async fn confirm_overwrite(&self, path: &Path) -> bool {
        let shown = path.display().to_string();
        let answer = tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout().lock();
            let _ = write!(
                stdout,
                "\x1b[1;33m\u{26a0}  Directory already exists:\x1b[0m {shown}\nOverwrite? [y/N]: "
            );
            let _ = stdout.flush();
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_affirmative(&line),
            Ok(Err(e)) => {
                debug!(error = %e, "failed to read overwrite answer");
                false
            }
            Err(e) => {
                debug!(error = %e, "overwrite prompt task failed");
                false
            }
        }
    }
}

/// `y` and `yes` in any case confirm; anything else declines.
pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
