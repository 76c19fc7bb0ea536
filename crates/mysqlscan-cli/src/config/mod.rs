//! Configuration management.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use mysqlscan::DiscoveryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::OutputFormat;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Default output format.
    pub output_format: Option<OutputFormat>,

    /// Discovery defaults; command-line flags override these.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "mysqlscan")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Set one key from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let d = &mut self.discovery;
        match key {
            "output_format" | "output" => self.output_format = Some(OutputFormat::parse(value)?),
            "binary" => d.binary = value.to_string(),
            "command_timeout_secs" | "timeout" => d.command_timeout_secs = value.parse()?,
            "concurrency" => d.concurrency = value.parse()?,
            "port_selection" => d.port_selection = value.parse().map_err(anyhow::Error::msg)?,
            "failure_policy" => {
                d.failure_policy = match value {
                    "isolate" => mysqlscan::FailurePolicy::Isolate,
                    "abort" | "strict" => mysqlscan::FailurePolicy::Abort,
                    _ => anyhow::bail!("failure_policy must be isolate or abort"),
                }
            }
            "socket_tool" => d.socket_tool = value.parse().map_err(anyhow::Error::msg)?,
            "ps_program" => d.ps_program = value.to_string(),
            _ => anyhow::bail!(
                "Unknown config key: {key}\n\n\
                 Available keys:\n  \
                 output_format        - Default output format (pretty/json/csv/yaml)\n  \
                 binary               - Server binary name (mysqld)\n  \
                 command_timeout_secs - Per-command time limit in seconds\n  \
                 concurrency          - Instances probed at once\n  \
                 port_selection       - lowest, highest or prefer=<port>\n  \
                 failure_policy       - isolate or abort\n  \
                 socket_tool          - netstat or ss\n  \
                 ps_program           - Process table program"
            ),
        }
        self.discovery.validate()?;
        Ok(())
    }
}
