//! Discovery configuration.

use mysqlscan_core::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default per-command time limit in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// How to pick one port when a process listens on several.
///
/// A server usually exposes its classic client port plus an auxiliary one
/// (e.g. 3306 and the X protocol on 33060). Taking the lowest is a heuristic
/// and can pick the wrong listener on unusual setups, hence the override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortSelection {
    /// Smallest observed port
    #[default]
    Lowest,
    /// Largest observed port
    Highest,
    /// This port if observed, otherwise the smallest
    Prefer(u16),
}

impl PortSelection {
    /// Pick a port from the observed set. `None` only for an empty slice.
    #[must_use]
    pub fn select(self, ports: &[u16]) -> Option<u16> {
        match self {
            Self::Lowest => ports.iter().copied().min(),
            Self::Highest => ports.iter().copied().max(),
            Self::Prefer(port) if ports.contains(&port) => Some(port),
            Self::Prefer(_) => ports.iter().copied().min(),
        }
    }
}

impl fmt::Display for PortSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowest => f.write_str("lowest"),
            Self::Highest => f.write_str("highest"),
            Self::Prefer(port) => write!(f, "prefer={port}"),
        }
    }
}

impl FromStr for PortSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lowest" | "min" => Ok(Self::Lowest),
            "highest" | "max" => Ok(Self::Highest),
            other => other
                .strip_prefix("prefer=")
                .and_then(|p| p.parse::<u16>().ok())
                .map(Self::Prefer)
                .ok_or_else(|| {
                    format!("unknown port selection {s:?} (expected lowest, highest or prefer=<port>)")
                }),
        }
    }
}

impl TryFrom<String> for PortSelection {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortSelection> for String {
    fn from(value: PortSelection) -> Self {
        value.to_string()
    }
}

/// What a failed candidate does to the rest of the discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure in the report and keep the other instances
    #[default]
    Isolate,
    /// Fail the whole discovery with the first error
    Abort,
}

/// Which socket table tool to read listeners from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketTool {
    /// `netstat -xnlp` and `netstat -tnlp` (net-tools)
    #[default]
    Netstat,
    /// `ss -xlnp` and `ss -tlnp` (iproute2)
    Ss,
}

impl SocketTool {
    /// Program to run
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Netstat => "netstat",
            Self::Ss => "ss",
        }
    }

    /// Arguments listing listening local sockets with their owners
    #[must_use]
    pub const fn unix_args(self) -> &'static [&'static str] {
        match self {
            Self::Netstat => &["-xnlp"],
            Self::Ss => &["-xlnp"],
        }
    }

    /// Arguments listing listening TCP sockets with their owners
    #[must_use]
    pub const fn tcp_args(self) -> &'static [&'static str] {
        match self {
            Self::Netstat => &["-tnlp"],
            Self::Ss => &["-tlnp"],
        }
    }
}

impl FromStr for SocketTool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "netstat" => Ok(Self::Netstat),
            "ss" => Ok(Self::Ss),
            _ => Err(format!("unknown socket tool {s:?} (expected netstat or ss)")),
        }
    }
}

/// Settings for one discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Server binary name to look for (matched against the file name)
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Time limit for each external command, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// How many candidates are probed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Port choice for processes with several TCP listeners
    #[serde(default)]
    pub port_selection: PortSelection,

    /// Per-candidate failure handling
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Process table program
    #[serde(default = "default_ps_program")]
    pub ps_program: String,

    /// Socket table source
    #[serde(default)]
    pub socket_tool: SocketTool,

    /// Arguments that make the server print its version
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,

    /// Arguments that make the server print its option help
    #[serde(default = "default_help_args")]
    pub help_args: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            command_timeout_secs: default_command_timeout(),
            concurrency: default_concurrency(),
            port_selection: PortSelection::default(),
            failure_policy: FailurePolicy::default(),
            ps_program: default_ps_program(),
            socket_tool: SocketTool::default(),
            version_args: default_version_args(),
            help_args: default_help_args(),
        }
    }
}

impl DiscoveryConfig {
    /// Reject settings that cannot produce a meaningful discovery.
    pub fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(ScanError::Config("binary name must not be empty".into()));
        }
        if self.binary.contains('/') {
            return Err(ScanError::Config(format!(
                "binary must be a file name, not a path: {}",
                self.binary
            )));
        }
        if self.command_timeout_secs == 0 {
            return Err(ScanError::Config("command_timeout_secs must be positive".into()));
        }
        if self.concurrency == 0 {
            return Err(ScanError::Config("concurrency must be positive".into()));
        }
        Ok(())
    }

    /// Per-command time limit
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// Default value functions for serde.
fn default_binary() -> String {
    String::from("mysqld")
}

const fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

const fn default_concurrency() -> usize {
    4
}

fn default_ps_program() -> String {
    String::from("ps")
}

fn default_version_args() -> Vec<String> {
    vec!["--verbose".into(), "--version".into()]
}

fn default_help_args() -> Vec<String> {
    vec!["--verbose".into(), "--help".into()]
}
