use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A server process's listening presence: a TCP port, a local socket file, or both.
///
/// At least one of `port` and `socket_file` is set on every endpoint produced
/// by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Owning process id
    #[serde(skip_serializing, default)]
    pub pid: u32,
    /// Socket state as reported by the socket table (e.g. `LISTEN`)
    pub state: String,
    /// Program name from the listener's `PID/Program` column
    pub program: String,
    /// Selected TCP port
    #[serde(default)]
    pub port: Option<u16>,
    /// Local (unix) socket file
    #[serde(default)]
    pub socket_file: Option<PathBuf>,
    /// Every TCP port observed for the process, sorted
    #[serde(default)]
    pub listen_ports: Vec<u16>,
    /// Every local socket file observed for the process, in table order
    #[serde(default)]
    pub listen_sockets: Vec<PathBuf>,
}

impl Endpoint {
    /// Endpoint backed by a TCP listener
    #[must_use]
    pub fn tcp(pid: u32, state: impl Into<String>, program: impl Into<String>, port: u16) -> Self {
        Self {
            pid,
            state: state.into(),
            program: program.into(),
            port: Some(port),
            socket_file: None,
            listen_ports: vec![port],
            listen_sockets: Vec::new(),
        }
    }

    /// Endpoint backed only by a local socket file
    #[must_use]
    pub fn socket(pid: u32, state: impl Into<String>, program: impl Into<String>, path: PathBuf) -> Self {
        Self {
            pid,
            state: state.into(),
            program: program.into(),
            port: None,
            socket_file: Some(path.clone()),
            listen_ports: Vec::new(),
            listen_sockets: vec![path],
        }
    }

    /// Attach the local socket file observed for the same process
    #[must_use]
    pub fn with_socket_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            if !self.listen_sockets.contains(&path) {
                self.listen_sockets.push(path.clone());
            }
            self.socket_file = Some(path);
        }
        self
    }

    /// Make `path` the selected socket file if the process was seen listening on it.
    ///
    /// Returns false, leaving the selection alone, for an unobserved path.
    pub fn prefer_socket(&mut self, path: &Path) -> bool {
        if self.listen_sockets.iter().any(|p| p == path) {
            self.socket_file = Some(path.to_path_buf());
            true
        } else {
            false
        }
    }

    /// Local socket file as a path
    #[must_use]
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_file.as_deref()
    }

    /// Where a client should connect to reach this endpoint.
    ///
    /// TCP is preferred when a port is known; `host` is the address to pair
    /// with it (usually a loopback address, since discovery is local).
    #[must_use]
    pub fn connect_target(&self, host: &str) -> Option<ConnectTarget> {
        match (self.port, &self.socket_file) {
            (Some(port), _) => Some(ConnectTarget::Tcp {
                host: host.to_string(),
                port,
            }),
            (None, Some(path)) => Some(ConnectTarget::Socket(path.clone())),
            (None, None) => None,
        }
    }
}

/// Connection target handed to client collaborators (SQL sessions, file transfer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectTarget {
    /// `host:port` over TCP
    Tcp {
        /// Host or address
        host: String,
        /// TCP port
        port: u16,
    },
    /// Local socket file
    Socket(PathBuf),
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            Self::Socket(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_endpoint_prefers_port() {
        let ep = Endpoint::tcp(1234, "LISTEN", "mysqld", 3306)
            .with_socket_file(Some(PathBuf::from("/tmp/mysql.sock")));
        assert_eq!(ep.listen_ports, vec![3306]);
        assert_eq!(
            ep.connect_target("127.0.0.1").unwrap().to_string(),
            "127.0.0.1:3306"
        );
    }

    #[test]
    fn socket_only_endpoint() {
        let ep = Endpoint::socket(7, "LISTENING", "mysqld", PathBuf::from("/run/mysqld/mysqld.sock"));
        assert_eq!(ep.port, None);
        assert_eq!(
            ep.connect_target("localhost"),
            Some(ConnectTarget::Socket(PathBuf::from("/run/mysqld/mysqld.sock")))
        );
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let target = ConnectTarget::Tcp {
            host: "::1".into(),
            port: 3306,
        };
        assert_eq!(target.to_string(), "[::1]:3306");
    }

    #[test]
    fn with_socket_file_none_keeps_existing() {
        let ep = Endpoint::socket(7, "LISTENING", "mysqld", PathBuf::from("/a.sock")).with_socket_file(None);
        assert_eq!(ep.socket_path(), Some(Path::new("/a.sock")));
    }

    #[test]
    fn prefer_socket_only_switches_to_observed_paths() {
        let mut ep = Endpoint::socket(7, "LISTENING", "mysqld", PathBuf::from("/run/mysqlx.sock"))
            .with_socket_file(Some(PathBuf::from("/run/mysqld.sock")));
        assert_eq!(ep.listen_sockets.len(), 2);
        assert!(ep.prefer_socket(Path::new("/run/mysqlx.sock")));
        assert_eq!(ep.socket_path(), Some(Path::new("/run/mysqlx.sock")));
        assert!(!ep.prefer_socket(Path::new("/tmp/other.sock")));
        assert_eq!(ep.socket_path(), Some(Path::new("/run/mysqlx.sock")));
    }

    #[test]
    fn pid_is_not_serialized() {
        let ep = Endpoint::tcp(99, "LISTEN", "mysqld", 3306);
        let json = serde_json::to_value(&ep).unwrap();
        assert!(json.get("pid").is_none());
        assert_eq!(json["port"], 3306);
    }
}
