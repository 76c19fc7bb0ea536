//! End-to-end discovery against canned command output.

use mysqlscan_core::{ScanError, Version};
use mysqlscan_probe::{
    CommandOutput, Discovery, DiscoveryConfig, FailurePolicy, PortSelection, StaticRunner,
    StaticUsers,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const NETSTAT_X: &str = "\
Active UNIX domain sockets (only servers)
Proto RefCnt Flags       Type       State         I-Node   PID/Program name     Path
unix  2      [ ACC ]     STREAM     LISTENING     18231    1/systemd            /run/systemd/private
unix  2      [ ACC ]     STREAM     LISTENING     23460    1234/mysqld          /tmp/mysqlx.sock
unix  2      [ ACC ]     STREAM     LISTENING     23456    1234/mysqld          /tmp/mysql.sock
";

const NETSTAT_T: &str = "\
Active Internet connections (only servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State       PID/Program name
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN      812/sshd
tcp6       0      0 :::33060                :::*                    LISTEN      1234/mysqld
tcp6       0      0 :::3306                 :::*                    LISTEN      1234/mysqld
";

struct Host {
    dir: TempDir,
    binary: PathBuf,
}

impl Host {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("mysqld");
        std::fs::write(&binary, "").unwrap();
        Self { dir, binary }
    }

    fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    fn help(&self) -> String {
        format!(
            "{bin}  Ver 5.7.31 for Linux on x86_64 (MySQL Community Server (GPL))\n\
             Starts the MySQL database server.\n\n\
             Default options are read from the following files in the given order:\n\
             {etc} ~/.my.cnf\n\
             The following groups are read: mysqld server mysqld-5.7\n",
            bin = self.binary.display(),
            etc = self.dir.path().join("etc/my.cnf").display(),
        )
    }

    fn runner(&self, ps: &str) -> StaticRunner {
        let bin = self.binary.display();
        StaticRunner::new()
            .with_stdout("netstat -xnlp", NETSTAT_X)
            .with_stdout("netstat -tnlp", NETSTAT_T)
            .with_stdout("ps -ef", ps)
            .with_stdout("ps -eo pid=,args=", "")
            .with_stdout(
                format!("{bin} --verbose --version"),
                format!("{bin}  Ver 5.7.31 for Linux on x86_64 (MySQL Community Server (GPL))\n"),
            )
            .with_stdout(format!("{bin} --verbose --help"), self.help())
    }

    fn users(&self) -> StaticUsers {
        StaticUsers::new().with_user("mysql", 27, self.home())
    }

    fn ps_line(&self, user: &str, pid: u32, args: &str) -> String {
        format!(
            "{user:<8} {pid:>6}       1  0 10:00 ?        00:00:01 {} {args}\n",
            self.binary.display()
        )
    }
}

fn ps_header() -> String {
    "UID          PID    PPID  C STIME TTY          TIME CMD\n".to_string()
}

#[tokio::test]
async fn discovers_single_instance() {
    let host = Host::new();
    std::fs::create_dir_all(host.home()).unwrap();
    std::fs::write(host.home().join(".my.cnf"), "[mysqld]\n").unwrap();

    let ps = ps_header() + &host.ps_line("mysql", 1234, "--datadir=/var/lib/mysql --port=3306");
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), host.runner(&ps), host.users())
            .unwrap();

    let report = discovery.run().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.instances.len(), 1);

    let inst = &report.instances[0];
    assert_eq!(inst.pid, 1234);
    assert_eq!(inst.ppid, 1);
    assert_eq!(inst.user.name, "mysql");
    assert_eq!(inst.binary, host.binary);
    assert_eq!(inst.version, Version::new(5, 7, 31));
    assert!(inst.version_text.contains("5.7.31"));
    assert_eq!(inst.flag("datadir"), Some("/var/lib/mysql"));

    // Lowest of the observed ports; the classic socket, not the X Protocol one.
    assert_eq!(inst.port(), Some(3306));
    let endpoint = inst.endpoint.as_ref().unwrap();
    assert_eq!(endpoint.listen_ports, [3306, 33060]);
    assert_eq!(inst.socket_file(), Some(Path::new("/tmp/mysql.sock")));
    assert_eq!(endpoint.listen_sockets.len(), 2);

    assert_eq!(inst.config.candidates.len(), 2);
    assert_eq!(inst.config_file(), Some(host.home().join(".my.cnf").as_path()));
}

#[tokio::test]
async fn socket_flag_selects_observed_socket_file() {
    let host = Host::new();
    let ps = ps_header() + &host.ps_line("mysql", 1234, "--socket=/tmp/mysqlx.sock");
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), host.runner(&ps), host.users())
            .unwrap();

    let report = discovery.run().await.unwrap();
    let inst = report.instance(1234).unwrap();
    assert_eq!(inst.socket_file(), Some(Path::new("/tmp/mysqlx.sock")));
    assert_eq!(inst.config_file(), None);
}

#[tokio::test]
async fn highest_port_selection() {
    let host = Host::new();
    let ps = ps_header() + &host.ps_line("mysql", 1234, "");
    let config = DiscoveryConfig {
        port_selection: PortSelection::Highest,
        ..DiscoveryConfig::default()
    };
    let discovery = Discovery::with_collaborators(config, host.runner(&ps), host.users()).unwrap();

    let report = discovery.run().await.unwrap();
    assert_eq!(report.instances[0].port(), Some(33060));
}

#[tokio::test]
async fn defaults_file_flag_takes_precedence() {
    let host = Host::new();
    let custom = host.dir.path().join("custom.cnf");
    std::fs::write(&custom, "[mysqld]\n").unwrap();
    std::fs::create_dir_all(host.dir.path().join("etc")).unwrap();
    std::fs::write(host.dir.path().join("etc/my.cnf"), "[mysqld]\n").unwrap();

    let ps = ps_header()
        + &host.ps_line("mysql", 1234, &format!("--defaults-file={}", custom.display()));
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), host.runner(&ps), host.users())
            .unwrap();

    let report = discovery.run().await.unwrap();
    let inst = &report.instances[0];
    assert_eq!(inst.config.candidates[0], custom);
    assert_eq!(inst.config_file(), Some(custom.as_path()));
}

#[tokio::test]
async fn isolate_records_failures_and_keeps_order() {
    let host = Host::new();
    let ps = ps_header()
        + &host.ps_line("mysql", 1234, "--port=3306")
        + &host.ps_line("ghost", 2201, "--port=3307")
        + &host.ps_line("mysql", 2300, "--port=3308");
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), host.runner(&ps), host.users())
            .unwrap();

    let report = discovery.run().await.unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.candidates(), 3);

    let pids: Vec<u32> = report.instances.iter().map(|i| i.pid).collect();
    assert_eq!(pids, [1234, 2300]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].pid, 2201);
    assert!(matches!(report.failures[0].error, ScanError::UnknownUser(ref u) if u == "ghost"));

    // 2300 never listened anywhere.
    assert!(report.instance(2300).unwrap().endpoint.is_none());
}

#[tokio::test]
async fn abort_fails_whole_run() {
    let host = Host::new();
    let ps = ps_header()
        + &host.ps_line("mysql", 1234, "")
        + &host.ps_line("ghost", 2201, "");
    let config = DiscoveryConfig {
        failure_policy: FailurePolicy::Abort,
        ..DiscoveryConfig::default()
    };
    let discovery = Discovery::with_collaborators(config, host.runner(&ps), host.users()).unwrap();

    let err = discovery.run().await.unwrap_err();
    assert!(matches!(err, ScanError::UnknownUser(_)));
}

#[tokio::test]
async fn missing_binary_is_instance_failure() {
    let host = Host::new();
    let ps = ps_header()
        + "mysql     1234       1  0 10:00 ?        00:00:01 /nonexistent/sbin/mysqld --port=3306\n";
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), host.runner(&ps), host.users())
            .unwrap();

    let report = discovery.run().await.unwrap();
    assert!(report.instances.is_empty());
    assert!(matches!(
        report.failures[0].error,
        ScanError::BinaryPath { ref path, .. } if path == Path::new("/nonexistent/sbin/mysqld")
    ));
}

#[tokio::test]
async fn failing_socket_listing_aborts_regardless_of_policy() {
    let host = Host::new();
    let ps = ps_header() + &host.ps_line("mysql", 1234, "");
    let runner = host.runner(&ps).with_output(
        "netstat -tnlp",
        CommandOutput {
            status: Some(5),
            stdout: String::new(),
            stderr: "netstat: no support for `AF INET (tcp)' on this system.".into(),
        },
    );
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), runner, host.users()).unwrap();

    let err = discovery.run().await.unwrap_err();
    assert!(matches!(err, ScanError::CommandFailed { status: Some(5), .. }));
}

#[tokio::test]
async fn failed_version_probe_is_instance_failure() {
    let host = Host::new();
    let ps = ps_header() + &host.ps_line("mysql", 1234, "");
    let runner = host.runner(&ps).with_stdout(
        format!("{} --verbose --version", host.binary.display()),
        "mysqld: unknown variable 'verbose'\n",
    );
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), runner, host.users()).unwrap();

    let report = discovery.run().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].error.probe(),
        Some(mysqlscan_core::Probe::Version)
    );
}

#[tokio::test]
async fn unprivileged_socket_tables_leave_instance_without_endpoint() {
    let host = Host::new();
    let ps = ps_header() + &host.ps_line("mysql", 1234, "");
    let hidden = CommandOutput {
        status: Some(0),
        stdout: "\
Active UNIX domain sockets (only servers)
Proto RefCnt Flags       Type       State         I-Node   PID/Program name     Path
unix  2      [ ACC ]     STREAM     LISTENING     23456    -                    /var/run/mysqld/mysqld.sock
"
        .into(),
        stderr: "(Not all processes could be identified, non-owned process info\n \
                 will not be shown, you would have to be root to see it all.)"
            .into(),
    };
    let runner = host
        .runner(&ps)
        .with_output("netstat -xnlp", hidden)
        .with_stdout(
            "netstat -tnlp",
            "tcp        0      0 127.0.0.1:3306          0.0.0.0:*               LISTEN      -\n",
        );
    let discovery =
        Discovery::with_collaborators(DiscoveryConfig::default(), runner, host.users()).unwrap();

    let report = discovery.run().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.instances.len(), 1);
    assert!(report.instances[0].endpoint.is_none());
}
