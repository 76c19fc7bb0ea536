use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// The external listing or probe whose output could not be understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    /// `ps -ef` process table
    ProcessList,
    /// `netstat -xnlp` local socket table
    UnixSockets,
    /// `netstat -tnlp` TCP listener table
    TcpListeners,
    /// `<binary> --verbose --version`
    Version,
    /// `<binary> --verbose --help`, default options search order
    DefaultsSearch,
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ProcessList => "process list",
            Self::UnixSockets => "unix socket table",
            Self::TcpListeners => "tcp listener table",
            Self::Version => "version probe",
            Self::DefaultsSearch => "defaults search path probe",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while discovering server instances
#[derive(Error, Debug)]
pub enum ScanError {
    /// External command could not be started or its output not captured
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// External command exited unsuccessfully
    #[error("`{command}` exited with {}: {output}", .status.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Exit code, `None` when killed by a signal
        status: Option<i32>,
        /// Trimmed combined output
        output: String,
    },

    /// External command did not finish in time
    #[error("`{command}` timed out after {secs} seconds")]
    Timeout {
        /// Command line that was run
        command: String,
        /// Configured limit
        secs: u64,
    },

    /// Captured output did not match the expected grammar
    #[error("{probe}: {reason} (input: {input:?})")]
    Parse {
        /// Which probe produced the output
        probe: Probe,
        /// What was expected and not found
        reason: String,
        /// The offending raw text, truncated
        input: String,
    },

    /// Owning user of a process does not exist in the user database
    #[error("unknown OS user: {0}")]
    UnknownUser(String),

    /// User database could not be queried
    #[error("user lookup for {user} failed: {reason}")]
    UserLookup {
        /// Name that was looked up
        user: String,
        /// Error reported by the OS
        reason: String,
    },

    /// Server binary path from the process table is unusable
    #[error("binary {}: {reason}", .path.display())]
    BinaryPath {
        /// Path taken from the process table
        path: PathBuf,
        /// Why it cannot be probed
        reason: String,
    },

    /// Invalid discovery configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Longest slice of raw input kept inside a [`ScanError::Parse`].
const MAX_INPUT_EXCERPT: usize = 240;

impl ScanError {
    /// Build a parse error, keeping a bounded excerpt of the raw input.
    pub fn parse(probe: Probe, reason: impl Into<String>, input: &str) -> Self {
        let input = input.trim();
        let input = match input.char_indices().nth(MAX_INPUT_EXCERPT) {
            Some((idx, _)) => format!("{}...", &input[..idx]),
            None => input.to_string(),
        };
        Self::Parse {
            probe,
            reason: reason.into(),
            input,
        }
    }

    /// Returns true if running the same discovery again may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the probe whose output failed to parse, if this is a parse error
    #[must_use]
    pub const fn probe(&self) -> Option<Probe> {
        match self {
            Self::Parse { probe, .. } => Some(*probe),
            _ => None,
        }
    }
}
