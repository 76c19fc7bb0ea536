//! Report rendering shared by the commands.

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored tables for a terminal
    #[default]
    #[value(alias = "table")]
    Pretty,
    /// Pretty-printed JSON document
    Json,
    /// One row per record, with a header line
    Csv,
    /// YAML document
    #[value(alias = "yml")]
    Yaml,
}

impl OutputFormat {
    /// Parse a format name the way the `--output` flag does, aliases included.
    pub fn parse(value: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(value, true)
            .map_err(|_| anyhow::anyhow!("Unknown output format: {value} (pretty, json, csv, yaml)"))
    }

    /// Canonical lowercase name.
    pub fn name(self) -> String {
        self.to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default()
    }

    /// Write `value` as a whole document when the format is JSON or YAML.
    ///
    /// Returns false for the formats the caller renders row by row.
    pub fn print_document<T: Serialize>(self, value: &T) -> Result<bool> {
        match self {
            Self::Json => println!("{}", serde_json::to_string_pretty(value)?),
            Self::Yaml => print!("{}", serde_yaml::to_string(value)?),
            Self::Pretty | Self::Csv => return Ok(false),
        }
        Ok(true)
    }
}
