//! Socket table parsing: maps server process ids to their listening endpoints.
//!
//! Two listings are read, one for local (unix) sockets and one for TCP
//! listeners, from either `netstat` or `ss`:
//!
//! ```text
//! netstat -xnlp: unix  2  [ ACC ]  STREAM  LISTENING  23456  1234/mysqld  /var/lib/mysql/mysql.sock
//! netstat -tnlp: tcp6  0  0  :::3306  :::*  LISTEN  1234/mysqld
//! ss -xlnp:      u_str LISTEN 0 151 /var/lib/mysql/mysql.sock 23456 * 0 users:(("mysqld",pid=1234,fd=25))
//! ss -tlnp:      LISTEN 0 151 *:3306 *:* users:(("mysqld",pid=1234,fd=23))
//! ```

use mysqlscan_core::{Endpoint, Probe, Result, ScanError};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::{DiscoveryConfig, PortSelection, SocketTool};
use crate::parse::{parse_pid, RowError};
use crate::runner::{CommandRunner, CommandSpec};

/// Printed by netstat when it cannot see other users' sockets.
const NETSTAT_UNPRIVILEGED_HINT: &str = "Not all processes could be identified";

/// A listening local socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixListener {
    /// Owning process id
    pub pid: u32,
    /// Owning program name
    pub program: String,
    /// Socket state (`LISTENING` / `LISTEN`)
    pub state: String,
    /// Socket file
    pub path: PathBuf,
}

/// A listening TCP socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpListener {
    /// Owning process id
    pub pid: u32,
    /// Owning program name
    pub program: String,
    /// Socket state (`LISTEN`)
    pub state: String,
    /// Local address as printed (`0.0.0.0:3306`, `:::33060`, `*:3306`)
    pub local: String,
    /// Port parsed from the local address
    pub port: u16,
}

/// Port of a `host:port` local address: the text after the last `:`.
pub fn port_of(local: &str) -> std::result::Result<u16, RowError> {
    let (_, port) = local
        .rsplit_once(':')
        .ok_or(RowError::Missing("port separator in local address"))?;
    port.trim().parse::<u16>().map_err(|_| RowError::NotANumber {
        column: "port",
        value: port.to_string(),
    })
}

/// netstat's `PID/Program name` column.
fn split_netstat_owner(field: &str) -> std::result::Result<(u32, String), RowError> {
    if field == "-" {
        return Err(RowError::Unowned);
    }
    let (pid, program) = field
        .split_once('/')
        .ok_or(RowError::Missing("PID/Program column"))?;
    Ok((parse_pid("PID", pid)?, program.to_string()))
}

fn ss_owner_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\("([^"]*)",pid=(\d+)"#).expect("valid regex"))
}

/// ss's `users:(("mysqld",pid=1234,fd=23))` column; the first owner wins.
fn split_ss_owner(fields: &[&str]) -> std::result::Result<(u32, String), RowError> {
    let users = fields
        .iter()
        .find(|f| f.starts_with("users:("))
        .ok_or(RowError::Unowned)?;
    let caps = ss_owner_re()
        .captures(users)
        .ok_or(RowError::Missing("pid in users:(...) column"))?;
    Ok((parse_pid("pid", &caps[2])?, caps[1].to_string()))
}

fn state_index(fields: &[&str], state: &'static str) -> std::result::Result<usize, RowError> {
    fields
        .iter()
        .position(|f| *f == state)
        .ok_or(RowError::Missing(state))
}

/// Parse a `netstat -xnlp` row.
///
/// The flags column may contain spaces (`[ ACC ]`), so fields are located
/// relative to the `LISTENING` state: inode, `PID/Program`, path.
pub fn parse_netstat_unix_row(line: &str) -> std::result::Result<UnixListener, RowError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let at = state_index(&fields, "LISTENING")?;
    let owner = fields.get(at + 2).ok_or(RowError::TooFewFields {
        expected: at + 4,
        found: fields.len(),
    })?;
    let path = fields.get(at + 3).ok_or(RowError::Missing("socket path"))?;
    let (pid, program) = split_netstat_owner(owner)?;
    Ok(UnixListener {
        pid,
        program,
        state: fields[at].to_string(),
        path: PathBuf::from(path),
    })
}

/// Parse a `netstat -tnlp` row: proto, recv-q, send-q, local, foreign, state, `PID/Program`.
pub fn parse_netstat_tcp_row(line: &str) -> std::result::Result<TcpListener, RowError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(RowError::TooFewFields {
            expected: 7,
            found: fields.len(),
        });
    }
    let (pid, program) = split_netstat_owner(fields[6])?;
    Ok(TcpListener {
        pid,
        program,
        state: fields[5].to_string(),
        local: fields[3].to_string(),
        port: port_of(fields[3])?,
    })
}

/// Parse an `ss -xlnp` row: `[netid] LISTEN recv-q send-q path inode peer peer-port users:(...)`.
pub fn parse_ss_unix_row(line: &str) -> std::result::Result<UnixListener, RowError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let at = state_index(&fields, "LISTEN")?;
    let path = fields
        .get(at + 3)
        .filter(|p| p.starts_with('/') || p.starts_with('@'))
        .ok_or(RowError::Missing("socket path"))?;
    let (pid, program) = split_ss_owner(&fields)?;
    Ok(UnixListener {
        pid,
        program,
        state: fields[at].to_string(),
        path: PathBuf::from(path),
    })
}

/// Parse an `ss -tlnp` row: `LISTEN recv-q send-q local peer users:(...)`.
pub fn parse_ss_tcp_row(line: &str) -> std::result::Result<TcpListener, RowError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let at = state_index(&fields, "LISTEN")?;
    let local = fields.get(at + 3).ok_or(RowError::TooFewFields {
        expected: at + 5,
        found: fields.len(),
    })?;
    let (pid, program) = split_ss_owner(&fields)?;
    Ok(TcpListener {
        pid,
        program,
        state: fields[at].to_string(),
        local: (*local).to_string(),
        port: port_of(local)?,
    })
}

/// Run `parse` over the rows that mention `binary`, keeping rows owned by it.
///
/// Rows whose owner is hidden are skipped like rows of other programs. Rows
/// that mention the binary but do not fit the grammar are skipped too; if
/// every such row is rejected the listing is considered unreadable.
fn collect_rows<T>(
    output: &str,
    binary: &str,
    probe: Probe,
    row_filter: impl Fn(&str) -> bool,
    parse: impl Fn(&str) -> std::result::Result<T, RowError>,
    program_of: impl Fn(&T) -> &str,
) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for line in output.lines().filter(|l| l.contains(binary) && row_filter(l)) {
        match parse(line) {
            Ok(row) if program_of(&row) == binary => rows.push(row),
            Ok(_) => {}
            Err(RowError::Unowned) => debug!(%probe, line, "skipping row with hidden owner"),
            Err(e) => {
                debug!(%probe, line, error = %e, "skipping socket row");
                rejected.push((line, e));
            }
        }
    }

    match rejected.first() {
        Some((line, e)) if rows.is_empty() => Err(ScanError::parse(
            probe,
            format!("no row naming {binary} could be parsed: {e}"),
            line,
        )),
        _ => Ok(rows),
    }
}

/// Listening local sockets owned by `binary`.
pub fn parse_unix_listeners(tool: SocketTool, output: &str, binary: &str) -> Result<Vec<UnixListener>> {
    match tool {
        SocketTool::Netstat => collect_rows(
            output,
            binary,
            Probe::UnixSockets,
            |l| l.starts_with("unix"),
            parse_netstat_unix_row,
            |r| r.program.as_str(),
        ),
        SocketTool::Ss => collect_rows(
            output,
            binary,
            Probe::UnixSockets,
            |l| l.split_whitespace().any(|f| f == "LISTEN"),
            parse_ss_unix_row,
            |r| r.program.as_str(),
        ),
    }
}

/// Listening TCP sockets owned by `binary`.
pub fn parse_tcp_listeners(tool: SocketTool, output: &str, binary: &str) -> Result<Vec<TcpListener>> {
    match tool {
        SocketTool::Netstat => collect_rows(
            output,
            binary,
            Probe::TcpListeners,
            |l| l.starts_with("tcp"),
            parse_netstat_tcp_row,
            |r| r.program.as_str(),
        ),
        SocketTool::Ss => collect_rows(
            output,
            binary,
            Probe::TcpListeners,
            |l| l.starts_with("LISTEN"),
            parse_ss_tcp_row,
            |r| r.program.as_str(),
        ),
    }
}

/// X Protocol sockets are named `mysqlx.sock` by default.
fn is_x_protocol_socket(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with("mysqlx"))
}

/// Socket file a classic client should use: the last classic-protocol socket
/// in table order, or the last socket when only X Protocol ones exist.
fn client_socket(paths: &[PathBuf]) -> Option<&Path> {
    paths
        .iter()
        .rev()
        .find(|p| !is_x_protocol_socket(p))
        .or_else(|| paths.last())
        .map(PathBuf::as_path)
}

/// Endpoints keyed by owning process id.
#[derive(Debug, Clone, Default)]
pub struct SocketTable {
    endpoints: HashMap<u32, Endpoint>,
}

impl SocketTable {
    /// Merge both listings into one endpoint per process.
    ///
    /// TCP listeners are grouped per pid and one port is chosen with
    /// `selection`; socket files are then joined by pid. A process seen only
    /// in the unix listing still gets an endpoint, without a port. Of several
    /// socket files the last classic-protocol one is selected.
    #[must_use]
    pub fn build(unix: &[UnixListener], tcp: &[TcpListener], selection: PortSelection) -> Self {
        let mut ports: HashMap<u32, (BTreeSet<u16>, &TcpListener)> = HashMap::new();
        for listener in tcp {
            ports
                .entry(listener.pid)
                .or_insert_with(|| (BTreeSet::new(), listener))
                .0
                .insert(listener.port);
        }

        let mut endpoints: HashMap<u32, Endpoint> = HashMap::new();
        for (pid, (observed, first)) in ports {
            let observed: Vec<u16> = observed.into_iter().collect();
            let Some(port) = selection.select(&observed) else {
                continue;
            };
            if observed.len() > 1 {
                debug!(pid, ?observed, port, %selection, "several TCP listeners, picked one");
            }
            let mut endpoint = Endpoint::tcp(pid, &first.state, &first.program, port);
            endpoint.listen_ports = observed;
            endpoints.insert(pid, endpoint);
        }

        for listener in unix {
            let endpoint = match endpoints.remove(&listener.pid) {
                Some(ep) => ep.with_socket_file(Some(listener.path.clone())),
                None => Endpoint::socket(
                    listener.pid,
                    &listener.state,
                    &listener.program,
                    listener.path.clone(),
                ),
            };
            endpoints.insert(listener.pid, endpoint);
        }

        for endpoint in endpoints.values_mut() {
            let selected = client_socket(&endpoint.listen_sockets).map(Path::to_path_buf);
            if selected.is_some() {
                endpoint.socket_file = selected;
            }
        }

        Self { endpoints }
    }

    /// Endpoint of a process
    #[must_use]
    pub fn get(&self, pid: u32) -> Option<&Endpoint> {
        self.endpoints.get(&pid)
    }

    /// Number of processes with an endpoint
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if no listener was found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Read both socket listings and build the table.
pub async fn read_socket_table<R>(runner: &R, config: &DiscoveryConfig) -> Result<SocketTable>
where
    R: CommandRunner + ?Sized,
{
    let tool = config.socket_tool;

    let unix_cmd = CommandSpec::new(tool.program(), tool.unix_args().iter().copied());
    let unix_out = runner.combined_output(&unix_cmd).await?;
    let unix = parse_unix_listeners(tool, &unix_out, &config.binary)?;

    let tcp_cmd = CommandSpec::new(tool.program(), tool.tcp_args().iter().copied());
    let tcp_out = runner.combined_output(&tcp_cmd).await?;
    let tcp = parse_tcp_listeners(tool, &tcp_out, &config.binary)?;

    if unix_out.contains(NETSTAT_UNPRIVILEGED_HINT) || tcp_out.contains(NETSTAT_UNPRIVILEGED_HINT) {
        warn!("socket table lacks other users' processes; run as root for complete endpoints");
    }

    let table = SocketTable::build(&unix, &tcp, config.port_selection);
    debug!(
        unix = unix.len(),
        tcp = tcp.len(),
        endpoints = table.len(),
        "socket table read"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETSTAT_X: &str = "\
Active UNIX domain sockets (only servers)
Proto RefCnt Flags       Type       State         I-Node   PID/Program name     Path
unix  2      [ ACC ]     STREAM     LISTENING     18231    1/systemd            /run/systemd/private
unix  2      [ ACC ]     STREAM     LISTENING     23456    1234/mysqld          /tmp/mysql.sock
unix  2      [ ACC ]     STREAM     LISTENING     23460    1234/mysqld          /tmp/mysqlx.sock
unix  2      [ ACC ]     STREAM     LISTENING     24001    2201/mysqld          /var/run/mysqld/mysqld2.sock
";

    const NETSTAT_T: &str = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN      812/sshd
tcp6       0      0 :::33060                :::*                    LISTEN      1234/mysqld
tcp6       0      0 :::3306                 :::*                    LISTEN      1234/mysqld
tcp        0      0 127.0.0.1:9104          0.0.0.0:*               LISTEN      3000/mysqld_exporter
";

    #[test]
    fn netstat_unix_row() {
        let row = parse_netstat_unix_row(
            "unix  2      [ ACC ]     STREAM     LISTENING     23456    1234/mysqld          /tmp/mysql.sock",
        )
        .unwrap();
        assert_eq!(row.pid, 1234);
        assert_eq!(row.program, "mysqld");
        assert_eq!(row.state, "LISTENING");
        assert_eq!(row.path, PathBuf::from("/tmp/mysql.sock"));
    }

    #[test]
    fn netstat_tcp_row() {
        let row = parse_netstat_tcp_row(
            "tcp6       0      0 :::33060                :::*                    LISTEN      1234/mysqld",
        )
        .unwrap();
        assert_eq!(row.port, 33060);
        assert_eq!(row.local, ":::33060");
        assert_eq!(row.state, "LISTEN");
    }

    #[test]
    fn hidden_owner_is_unowned() {
        assert_eq!(
            parse_netstat_tcp_row("tcp 0 0 0.0.0.0:3306 0.0.0.0:* LISTEN -"),
            Err(RowError::Unowned)
        );
        assert_eq!(
            parse_ss_tcp_row("LISTEN 0 151 *:3306 *:*"),
            Err(RowError::Unowned)
        );
    }

    #[test]
    fn hidden_owner_rows_do_not_fail_the_listing() {
        let unix = "\
unix  2      [ ACC ]     STREAM     LISTENING     23456    -                    /var/run/mysqld/mysqld.sock
";
        let tcp = "\
tcp        0      0 127.0.0.1:3306          0.0.0.0:*               LISTEN      -
";
        assert!(parse_unix_listeners(SocketTool::Netstat, unix, "mysqld").unwrap().is_empty());
        assert!(parse_tcp_listeners(SocketTool::Netstat, tcp, "mysqld").unwrap().is_empty());
    }

    #[test]
    fn port_after_last_colon() {
        assert_eq!(port_of("0.0.0.0:3306"), Ok(3306));
        assert_eq!(port_of("[::]:3306"), Ok(3306));
        assert_eq!(port_of("*:3306"), Ok(3306));
        assert!(port_of("3306").is_err());
        assert!(port_of("0.0.0.0:*").is_err());
    }

    #[test]
    fn minimum_port_is_kept() {
        let unix = parse_unix_listeners(SocketTool::Netstat, NETSTAT_X, "mysqld").unwrap();
        let tcp = parse_tcp_listeners(SocketTool::Netstat, NETSTAT_T, "mysqld").unwrap();
        let table = SocketTable::build(&unix, &tcp, PortSelection::Lowest);

        let ep = table.get(1234).unwrap();
        assert_eq!(ep.port, Some(3306));
        assert_eq!(ep.listen_ports, vec![3306, 33060]);
        assert_eq!(ep.socket_path(), Some(Path::new("/tmp/mysql.sock")));
        assert_eq!(ep.listen_sockets.len(), 2);
        assert_eq!(ep.program, "mysqld");
    }

    #[test]
    fn classic_socket_is_selected_over_x_protocol() {
        let listener = |path: &str| UnixListener {
            pid: 9,
            program: "mysqld".into(),
            state: "LISTENING".into(),
            path: PathBuf::from(path),
        };

        let table = SocketTable::build(
            &[listener("/tmp/mysqlx.sock"), listener("/tmp/mysql.sock")],
            &[],
            PortSelection::Lowest,
        );
        assert_eq!(table.get(9).unwrap().socket_path(), Some(Path::new("/tmp/mysql.sock")));

        let table = SocketTable::build(
            &[listener("/run/a.sock"), listener("/run/b.sock"), listener("/run/mysqlx.sock")],
            &[],
            PortSelection::Lowest,
        );
        assert_eq!(table.get(9).unwrap().socket_path(), Some(Path::new("/run/b.sock")));

        let table = SocketTable::build(&[listener("/run/mysqlx.sock")], &[], PortSelection::Lowest);
        assert_eq!(table.get(9).unwrap().socket_path(), Some(Path::new("/run/mysqlx.sock")));
    }

    #[test]
    fn port_selection_is_overridable() {
        let tcp = parse_tcp_listeners(SocketTool::Netstat, NETSTAT_T, "mysqld").unwrap();
        let table = SocketTable::build(&[], &tcp, PortSelection::Highest);
        assert_eq!(table.get(1234).unwrap().port, Some(33060));
    }

    #[test]
    fn socket_only_process_gets_endpoint() {
        let unix = parse_unix_listeners(SocketTool::Netstat, NETSTAT_X, "mysqld").unwrap();
        let table = SocketTable::build(&unix, &[], PortSelection::Lowest);
        let ep = table.get(2201).unwrap();
        assert_eq!(ep.port, None);
        assert_eq!(ep.socket_path(), Some(Path::new("/var/run/mysqld/mysqld2.sock")));
    }

    #[test]
    fn other_programs_are_ignored() {
        let tcp = parse_tcp_listeners(SocketTool::Netstat, NETSTAT_T, "mysqld").unwrap();
        assert!(tcp.iter().all(|l| l.pid == 1234));
        let unix = parse_unix_listeners(SocketTool::Netstat, NETSTAT_X, "mysqld").unwrap();
        assert!(unix.iter().all(|l| l.program == "mysqld"));
    }

    #[test]
    fn unreadable_rows_fail_the_listing() {
        let err = parse_tcp_listeners(SocketTool::Netstat, "tcp 0 0 0.0.0.0 mysqld\n", "mysqld")
            .unwrap_err();
        assert_eq!(err.probe(), Some(Probe::TcpListeners));
    }

    #[test]
    fn ss_rows() {
        let tcp = parse_ss_tcp_row(
            r#"LISTEN 0      151                *:3306            *:*    users:(("mysqld",pid=1234,fd=23))"#,
        )
        .unwrap();
        assert_eq!((tcp.pid, tcp.port), (1234, 3306));
        assert_eq!(tcp.program, "mysqld");

        let unix = parse_ss_unix_row(
            r#"u_str LISTEN 0      151    /var/lib/mysql/mysql.sock 23456            * 0    users:(("mysqld",pid=1234,fd=25))"#,
        )
        .unwrap();
        assert_eq!(unix.pid, 1234);
        assert_eq!(unix.path, PathBuf::from("/var/lib/mysql/mysql.sock"));
    }

    #[test]
    fn ss_listing_skips_header() {
        let out = "\
State  Recv-Q Send-Q Local Address:Port Peer Address:Port Process
LISTEN 0      151          0.0.0.0:3306      0.0.0.0:*    users:((\"mysqld\",pid=77,fd=20))
LISTEN 0      70           0.0.0.0:33060     0.0.0.0:*    users:((\"mysqld\",pid=77,fd=21))
";
        let tcp = parse_tcp_listeners(SocketTool::Ss, out, "mysqld").unwrap();
        let table = SocketTable::build(&[], &tcp, PortSelection::default());
        assert_eq!(table.get(77).unwrap().port, Some(3306));
    }
}
