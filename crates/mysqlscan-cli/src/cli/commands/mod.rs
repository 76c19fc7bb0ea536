//! Command implementations.

pub mod config;
pub mod discover;

use std::path::PathBuf;

use crate::config::Config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output format
    pub output_format: OutputFormat,

    /// Verbose output
    pub verbose: bool,

    /// Loaded configuration
    pub config: Config,

    /// Where `config` was loaded from (and is saved to)
    pub config_path: PathBuf,
}
