//! Binary-side plumbing: configuration, input, prompts, progress and output.

pub(crate) mod config;
pub(crate) mod input;
pub(crate) mod output;
pub(crate) mod progress;
pub(crate) mod prompt;
pub(crate) mod runtime;
