//! Correlation of process, socket and binary probes into instances.

use chrono::Utc;
use futures_util::{stream, StreamExt, TryStreamExt};
use mysqlscan_core::{DiscoveryReport, Instance, InstanceFailure, Result, ScanError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{DiscoveryConfig, FailurePolicy};
use crate::defaults::locate_config;
use crate::process::{find_candidates, parse_cmdline_table, Candidate};
use crate::runner::{CommandRunner, CommandSpec, SystemRunner};
use crate::sockets::{read_socket_table, SocketTable};
use crate::users::{SystemUsers, UserDirectory};
use crate::version::probe_version;

/// Discovers running server instances.
///
/// Each [`run`](Self::run) takes a fresh snapshot; nothing is cached between
/// calls. The socket table and process table are read once per run, then
/// every candidate process is probed (version, options file), up to
/// `concurrency` candidates at a time.
pub struct Discovery<R = SystemRunner, U = SystemUsers> {
    config: DiscoveryConfig,
    runner: R,
    users: U,
}

impl Discovery {
    /// Discovery against the live system
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        let runner = SystemRunner::new(config.command_timeout());
        Self::with_collaborators(config, runner, SystemUsers)
    }
}

impl<R: CommandRunner, U: UserDirectory> Discovery<R, U> {
    /// Discovery with caller-supplied command runner and user directory
    pub fn with_collaborators(config: DiscoveryConfig, runner: R, users: U) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            runner,
            users,
        })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Take one discovery snapshot.
    ///
    /// Failing to read the socket table or the process table fails the call.
    /// A candidate whose own probes fail is recorded in
    /// [`DiscoveryReport::failures`] under [`FailurePolicy::Isolate`], or fails
    /// the call with the first such error (in listing order) under
    /// [`FailurePolicy::Abort`].
    pub async fn run(&self) -> Result<DiscoveryReport> {
        let span = info_span!("discovery", binary = %self.config.binary);
        self.snapshot().instrument(span).await
    }

    async fn snapshot(&self) -> Result<DiscoveryReport> {
        let collected_at = Utc::now();
        let sockets = read_socket_table(&self.runner, &self.config).await?;

        let ps = CommandSpec::new(&self.config.ps_program, ["-ef"]);
        let listing = self.runner.combined_output(&ps).await?;
        let candidates = find_candidates(&listing, &self.config.binary)?;
        let cmdlines = self.read_cmdlines().await;

        info!(
            candidates = candidates.len(),
            endpoints = sockets.len(),
            "probing candidates"
        );

        let probes = stream::iter(candidates)
            .map(|candidate| {
                let span = info_span!("instance", pid = candidate.pid());
                self.probe(candidate, &sockets, &cmdlines).instrument(span)
            })
            .buffered(self.config.concurrency);

        let (instances, failures) = match self.config.failure_policy {
            FailurePolicy::Abort => {
                let instances: Vec<Instance> = probes
                    .try_collect()
                    .await
                    .map_err(|failure: InstanceFailure| failure.error)?;
                (instances, Vec::new())
            }
            FailurePolicy::Isolate => {
                let outcomes: Vec<std::result::Result<Instance, InstanceFailure>> =
                    probes.collect().await;
                let mut instances = Vec::new();
                let mut failures = Vec::new();
                for outcome in outcomes {
                    match outcome {
                        Ok(inst) => instances.push(inst),
                        Err(failure) => failures.push(failure),
                    }
                }
                (instances, failures)
            }
        };

        info!(
            instances = instances.len(),
            failures = failures.len(),
            "discovery finished"
        );

        Ok(DiscoveryReport {
            collected_at,
            binary: self.config.binary.clone(),
            instances,
            failures,
        })
    }

    /// Full command lines by pid, for diagnostics only; failure is tolerated.
    async fn read_cmdlines(&self) -> HashMap<u32, String> {
        let cmd = CommandSpec::new(&self.config.ps_program, ["-eo", "pid=,args="]);
        match self.runner.combined_output(&cmd).await {
            Ok(out) => parse_cmdline_table(&out),
            Err(e) => {
                warn!(error = %e, "command line table unavailable");
                HashMap::new()
            }
        }
    }

    async fn probe(
        &self,
        candidate: Candidate,
        sockets: &SocketTable,
        cmdlines: &HashMap<u32, String>,
    ) -> std::result::Result<Instance, InstanceFailure> {
        match self.correlate(&candidate, sockets, cmdlines).await {
            Ok(inst) => Ok(inst),
            Err(error) => {
                warn!(%error, "candidate could not be probed");
                Err(InstanceFailure {
                    pid: candidate.pid(),
                    process_line: candidate.row.line,
                    error,
                })
            }
        }
    }

    async fn correlate(
        &self,
        candidate: &Candidate,
        sockets: &SocketTable,
        cmdlines: &HashMap<u32, String>,
    ) -> Result<Instance> {
        let row = &candidate.row;
        let user = self.users.lookup(&row.user)?;
        let binary = check_binary(&executable_path(candidate)).await?;

        let version = probe_version(&self.runner, &binary, &self.config.version_args).await?;
        if let Some(listed) = candidate.listing_version.filter(|v| *v != version.version) {
            warn!(
                %listed,
                reported = %version.version,
                "process table and binary disagree on version; using the binary's"
            );
        }

        let config = locate_config(
            &self.runner,
            &binary,
            &self.config.help_args,
            &user,
            &candidate.flags,
        )
        .await?;

        let mut inst = Instance {
            user,
            pid: row.pid,
            ppid: row.ppid,
            binary,
            flags: candidate.flags.clone(),
            version: version.version,
            version_text: version.text,
            endpoint: sockets.get(row.pid).cloned(),
            config,
            cmdline: cmdlines.get(&row.pid).cloned(),
            process_line: row.line.clone(),
            parent_cmdline: cmdlines.get(&row.ppid).cloned(),
        };

        // An explicit --socket names the client socket among several listeners.
        if let Some(socket) = inst.flag("socket").map(PathBuf::from) {
            if let Some(endpoint) = inst.endpoint.as_mut() {
                endpoint.prefer_socket(&socket);
            }
        }
        if inst.endpoint.is_none() {
            debug!("no listening endpoint");
        }

        Ok(inst)
    }
}

/// Executable path for a candidate.
///
/// A relative command (`./bin/mysqld`) is only meaningful from the process's
/// own working directory, so the kernel's view of the executable is used instead
/// when available.
fn executable_path(candidate: &Candidate) -> PathBuf {
    if candidate.binary.is_absolute() {
        return candidate.binary.clone();
    }
    let proc_exe = PathBuf::from(format!("/proc/{}/exe", candidate.pid()));
    std::fs::read_link(proc_exe).unwrap_or_else(|_| candidate.binary.clone())
}

/// The binary must exist and not be a directory before it is probed.
async fn check_binary(path: &Path) -> Result<PathBuf> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ScanError::BinaryPath {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if meta.is_dir() {
        return Err(ScanError::BinaryPath {
            path: path.to_path_buf(),
            reason: "is a directory".into(),
        });
    }
    Ok(path.to_path_buf())
}

/// Take one discovery snapshot of the live system.
pub async fn discover(config: DiscoveryConfig) -> Result<DiscoveryReport> {
    Discovery::new(config)?.run().await
}
