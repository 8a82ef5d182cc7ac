//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::TypedValueParser;

/// Download web-conference recordings.
///
/// Each recording is saved into its own directory, named after the
/// recording title, with the video, the raw session archive, captions,
/// a transcript, the chat log and the shared documents.
#[derive(Parser, Debug)]
#[command(name = "connectdl")]
#[command(author, version, about)]
pub struct Args {
    /// Recording URLs
    pub urls: Vec<String>,

    /// Text file with one URL per line (blank lines and # comments skipped)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub url_file: Option<PathBuf>,

    /// Output directory (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// BREEZESESSION token for private recordings
    #[arg(long, value_name = "TOKEN")]
    pub session: Option<String>,

    /// Overwrite existing recording directories without prompting
    #[arg(short = 'y', long)]
    pub overwrite: bool,

    /// Process recordings one at a time even with --overwrite
    #[arg(long)]
    pub sequential: bool,

    /// Download workers shared by all recordings (1-64)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=64).map(usize::from))]
    pub workers: Option<usize>,

    /// Recordings processed at once in concurrent mode (1-64)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=64).map(usize::from))]
    pub max_recordings: Option<usize>,

    /// MP4Box binary used to embed captions
    #[arg(long, value_name = "PATH")]
    pub mp4box: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/connectdl/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
