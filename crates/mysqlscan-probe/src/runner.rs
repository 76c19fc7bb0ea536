//! External command execution.
//!
//! Every probe talks to the OS through a [`CommandRunner`], so discovery can
//! run against the live system ([`SystemRunner`]) or against captured output
//! ([`StaticRunner`]).

use async_trait::async_trait;
use mysqlscan_core::{Result, ScanError};
use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

/// A program and its arguments. No shell is involved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command spec
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns true if the command exited with status 0
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Standard output followed by standard error
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        out.push_str(&self.stdout);
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

/// Runs external commands on behalf of the probes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output.
    ///
    /// A non-zero exit status is not an error at this level.
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput>;

    /// Run a command and return its combined output, failing on non-zero exit.
    async fn combined_output(&self, cmd: &CommandSpec) -> Result<String> {
        let output = self.run(cmd).await?;
        let combined = output.combined();
        if !output.success() {
            return Err(ScanError::CommandFailed {
                command: cmd.to_string(),
                status: output.status,
                output: combined.trim().to_string(),
            });
        }
        Ok(combined)
    }
}

/// Runs commands as child processes, each bounded by a timeout.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    /// Create a runner that kills any command running longer than `timeout`
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The per-command time limit
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_COMMAND_TIMEOUT_SECS))
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %cmd, "running");

        let mut command = tokio::process::Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Dropping the output future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ScanError::Spawn {
                    command: cmd.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ScanError::Timeout {
                    command: cmd.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Replays canned output keyed by command line.
///
/// Useful for running discovery against listings captured on another host,
/// and for tests. Unknown commands fail the way a missing program would.
#[derive(Debug, Clone, Default)]
pub struct StaticRunner {
    outputs: HashMap<String, CommandOutput>,
}

impl StaticRunner {
    /// Create an empty runner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register successful stdout for a command line such as `"ps -ef"`
    #[must_use]
    pub fn with_stdout(mut self, command: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.outputs.insert(command.into(), CommandOutput::ok(stdout));
        self
    }

    /// Register a full output (status and both streams) for a command line
    #[must_use]
    pub fn with_output(mut self, command: impl Into<String>, output: CommandOutput) -> Self {
        self.outputs.insert(command.into(), output);
        self
    }
}

#[async_trait]
impl CommandRunner for StaticRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        let key = cmd.to_string();
        self.outputs
            .get(&key)
            .cloned()
            .ok_or_else(|| ScanError::Spawn {
                command: key,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no canned output"),
            })
    }
}
