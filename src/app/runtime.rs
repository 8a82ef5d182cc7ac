use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use connectdl_core::{
    BatchCoordinator, BatchOptions, Downloader, HttpClient, Mp4BoxEmbedder, PoolConfig,
    RecordingOptions, WorkerPool,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::config::{Settings, load_config};
use crate::app::{input, output, progress::TerminalObserver, prompt::TerminalPrompt};
use crate::cli::Args;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    Failure,
}

/// Loads configuration, runs the batch and prints the summary.
pub(crate) async fn run(args: Args) -> Result<ProcessExit> {
    let loaded = load_config(args.config.as_deref())?;
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "config file loaded");
    }
    let settings = Settings::resolve(&args, &loaded.config);
    debug!(?settings, "settings resolved");

    let urls = input::collect_urls(&args)?;
    info!(count = urls.len(), "recordings to download");

    tokio::fs::create_dir_all(&settings.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory '{}'",
                settings.output_dir.display()
            )
        })?;

    let client =
        HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs);
    let pool = Arc::new(WorkerPool::new(
        client,
        PoolConfig {
            workers: settings.workers,
            queue_capacity: settings.queue_capacity,
        },
    )?);
    pool.start();

    let mut base = RecordingOptions::new(&settings.output_dir).with_overwrite(args.overwrite);
    if let Some(session) = args.session.as_deref() {
        base = base.with_session(session);
    }
    match Mp4BoxEmbedder::locate(settings.mp4box_path.as_deref()) {
        Ok(embedder) => {
            info!(path = %embedder.binary().display(), "MP4Box located");
            base = base.with_embedder(Arc::new(embedder));
        }
        Err(e) => warn!(reason = %e, "subtitles will not be embedded"),
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling downloads");
            interrupt.cancel();
        }
    });

    let show_bars = io::stderr().is_terminal() && !args.quiet;
    let options = BatchOptions {
        max_concurrent: settings.max_concurrent_recordings,
        recording_timeout: settings.recording_timeout,
        ..BatchOptions::for_run(urls.len(), args.overwrite, args.sequential)
    };
    let coordinator = BatchCoordinator::new(Downloader::with_pool(Arc::clone(&pool)), options)
        .with_prompt(Arc::new(TerminalPrompt))
        .with_observer(Arc::new(TerminalObserver::new(show_bars, args.quiet)))
        .with_cancel(cancel);

    let summary = coordinator.run(&urls, &base).await;
    pool.stop().await;

    if !args.quiet || !summary.is_success() {
        print!("{}", output::render_summary(&summary));
    }

    Ok(if summary.is_success() {
        ProcessExit::Success
    } else {
        ProcessExit::Failure
    })
}
