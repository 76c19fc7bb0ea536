use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::endpoint::{ConnectTarget, Endpoint};
use super::version::Version;

/// OS account that owns a server process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsUser {
    /// Login name
    pub name: String,
    /// Numeric user id
    pub uid: u32,
    /// Home directory, used to expand `~` in configuration search paths
    pub home_dir: PathBuf,
}

/// Where a server instance reads its options file from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLocation {
    /// Candidate files in search order; the first existing regular file wins
    pub candidates: Vec<PathBuf>,
    /// The candidate that exists on disk, if any
    pub resolved: Option<PathBuf>,
}

/// One running server process and everything correlated about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Owning OS user
    pub user: OsUser,
    /// Process id, unique within one discovery snapshot
    pub pid: u32,
    /// Parent process id (typically `mysqld_safe` or the service manager)
    pub ppid: u32,
    /// Absolute path of the server binary
    pub binary: PathBuf,
    /// Launch flags without leading dashes; bare flags map to `""`
    pub flags: BTreeMap<String, String>,
    /// Version reported by the binary itself
    pub version: Version,
    /// Raw version banner
    #[serde(skip_serializing, default)]
    pub version_text: String,
    /// Listening endpoint, if the socket table showed one
    pub endpoint: Option<Endpoint>,
    /// Options file search order and resolution
    pub config: ConfigLocation,
    /// Full command line of the process
    #[serde(default)]
    pub cmdline: Option<String>,
    /// Originating process-table row
    #[serde(skip_serializing, default)]
    pub process_line: String,
    /// Full command line of the parent process
    #[serde(skip_serializing, default)]
    pub parent_cmdline: Option<String>,
}

impl Instance {
    /// Look up a launch flag by name.
    ///
    /// The server treats `-` and `_` in option names as the same character,
    /// so `defaults-file` also finds `--defaults_file=...`.
    #[must_use]
    pub fn flag(&self, name: &str) -> Option<&str> {
        let wanted = normalize_flag(name);
        self.flags
            .iter()
            .find(|(k, _)| normalize_flag(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Resolved options file
    #[must_use]
    pub fn config_file(&self) -> Option<&Path> {
        self.config.resolved.as_deref()
    }

    /// TCP port, when the instance listens on one
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.endpoint.as_ref().and_then(|e| e.port)
    }

    /// Local socket file, when the instance listens on one
    #[must_use]
    pub fn socket_file(&self) -> Option<&Path> {
        self.endpoint.as_ref().and_then(Endpoint::socket_path)
    }

    /// Connection target for client collaborators
    #[must_use]
    pub fn connect_target(&self, host: &str) -> Option<ConnectTarget> {
        self.endpoint.as_ref().and_then(|e| e.connect_target(host))
    }
}

fn normalize_flag(name: &str) -> String {
    name.trim_start_matches('-').replace('_', "-")
}
