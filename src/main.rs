//! CLI entry point for connectdl.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod app;
mod cli;

use app::runtime::{self, ProcessExit};
use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(
        urls = args.urls.len(),
        overwrite = args.overwrite,
        sequential = args.sequential,
        session = args.session.is_some(),
        "CLI arguments parsed"
    );
    info!(version = env!("CARGO_PKG_VERSION"), "connectdl starting");

    match runtime::run(args).await? {
        ProcessExit::Success => Ok(ExitCode::SUCCESS),
        ProcessExit::Failure => Ok(ExitCode::FAILURE),
    }
}
