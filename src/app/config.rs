//! Configuration file loading and CLI/file/default resolution.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use connectdl_core::batch::{DEFAULT_MAX_CONCURRENT_RECORDINGS, DEFAULT_RECORDING_TIMEOUT};
use connectdl_core::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use connectdl_core::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use serde::Deserialize;

use crate::cli::Args;

/// TOML-backed defaults. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    /// Base output directory.
    pub output_dir: Option<PathBuf>,
    /// Worker pool size.
    pub workers: Option<usize>,
    /// Worker pool queue capacity.
    pub queue_capacity: Option<usize>,
    /// Recordings processed at once in concurrent mode.
    pub max_concurrent_recordings: Option<usize>,
    /// Ceiling for one recording, in seconds.
    pub recording_timeout_secs: Option<u64>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// MP4Box binary.
    pub mp4box_path: Option<PathBuf>,
}

impl FileConfig {
    /// Checks every present value against its allowed range.
    pub fn validate(&self) -> Result<()> {
        check_range("workers", self.workers, 1, 64)?;
        check_range("queue_capacity", self.queue_capacity, 1, 100_000)?;
        check_range(
            "max_concurrent_recordings",
            self.max_concurrent_recordings,
            1,
            64,
        )?;
        check_range("recording_timeout_secs", self.recording_timeout_secs, 1, 86_400)?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        check_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        Ok(())
    }
}

fn check_range<T>(field: &str, value: Option<T>, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if let Some(value) = value
        && (value < min || value > max)
    {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadedConfig {
    /// Path that was considered.
    pub path: Option<PathBuf>,
    /// Parsed config, when a file was read.
    pub config: FileConfig,
    /// Whether a file was actually read.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/connectdl/config.toml`
/// 2. `$HOME/.config/connectdl/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("connectdl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("connectdl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads an explicit config file, or the default one when it exists.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: load_file_config(path)?,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            ..LoadedConfig::default()
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Effective settings for one run: CLI over file over built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub output_dir: PathBuf,
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_concurrent_recordings: usize,
    pub recording_timeout: Duration,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub mp4box_path: Option<PathBuf>,
}

impl Settings {
    pub(crate) fn resolve(args: &Args, file: &FileConfig) -> Self {
        Self {
            output_dir: args
                .output
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            workers: args.workers.or(file.workers).unwrap_or(DEFAULT_WORKERS),
            queue_capacity: file.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            max_concurrent_recordings: args
                .max_recordings
                .or(file.max_concurrent_recordings)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_RECORDINGS),
            recording_timeout: file
                .recording_timeout_secs
                .map_or(DEFAULT_RECORDING_TIMEOUT, Duration::from_secs),
            connect_timeout_secs: file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS),
            mp4box_path: args.mp4box.clone().or_else(|| file.mp4box_path.clone()),
        }
    }
}
