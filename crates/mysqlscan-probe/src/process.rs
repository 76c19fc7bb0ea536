//! Process table parsing: finds candidate server processes in `ps -ef` output.
//!
//! Row grammar (`ps -ef`):
//!
//! ```text
//! UID  PID  PPID  C  STIME  TTY  TIME  CMD...
//! ```
//!
//! Seven leading fields, then the command line as the raw remainder. The
//! header row and rows that do not fit are skipped.

use mysqlscan_core::{Probe, Result, ScanError, Version};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::parse::{parse_pid, split_leading_fields, RowError};

/// Leading fields before CMD in `ps -ef`.
const PS_EF_LEADING_FIELDS: usize = 7;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    /// Owner as printed by ps (a name, or a uid when the name is too wide)
    pub user: String,
    /// Process id
    pub pid: u32,
    /// Parent process id
    pub ppid: u32,
    /// Command line (CMD column)
    pub command: String,
    /// The raw row
    pub line: String,
}

impl ProcessRow {
    /// First token of the command line, normally the executable path
    #[must_use]
    pub fn executable(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or_default()
    }

    /// Command-line tokens after the executable
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.command.split_whitespace().skip(1)
    }
}

/// Parse one `ps -ef` row.
pub fn parse_ps_row(line: &str) -> std::result::Result<ProcessRow, RowError> {
    let (fields, command) = split_leading_fields(line, PS_EF_LEADING_FIELDS)?;
    if command.is_empty() {
        return Err(RowError::TooFewFields {
            expected: PS_EF_LEADING_FIELDS + 1,
            found: PS_EF_LEADING_FIELDS,
        });
    }
    Ok(ProcessRow {
        user: fields[0].to_string(),
        pid: parse_pid("PID", fields[1])?,
        ppid: parse_pid("PPID", fields[2])?,
        command: command.to_string(),
        line: line.trim_end().to_string(),
    })
}

/// Parse a whole `ps -ef` listing, skipping the header and malformed rows.
pub fn parse_process_table(output: &str) -> Vec<ProcessRow> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match parse_ps_row(line) {
            Ok(row) => Some(row),
            Err(RowError::NotANumber { value, .. }) if value == "PID" => None,
            Err(e) => {
                debug!(line, error = %e, "skipping process row");
                None
            }
        })
        .collect()
}

/// Returns true if the row's executable is the server binary itself.
///
/// Matching the file name of the first command token rules out `grep mysqld`,
/// wrapper scripts such as `mysqld_safe`, and any argument that merely
/// mentions the binary.
#[must_use]
pub fn is_candidate(row: &ProcessRow, binary: &str) -> bool {
    if !row.command.contains(binary) {
        return false;
    }
    Path::new(row.executable())
        .file_name()
        .is_some_and(|name| name == binary)
}

/// A process table row identified as a running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The originating row
    pub row: ProcessRow,
    /// Executable path from the command line
    pub binary: PathBuf,
    /// Launch flags
    pub flags: BTreeMap<String, String>,
    /// Dotted version token found among the row's fields, if any
    pub listing_version: Option<Version>,
}

impl Candidate {
    /// Build a candidate from a matching row
    #[must_use]
    pub fn from_row(row: ProcessRow) -> Self {
        Self {
            binary: PathBuf::from(row.executable()),
            flags: parse_flags(row.arguments()),
            listing_version: listing_version(&row.line),
            row,
        }
    }

    /// Process id
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.row.pid
    }
}

/// Select the server processes from a `ps -ef` listing, in listing order.
///
/// A listing without a single readable row (not even `ps` itself) is not a
/// process table, and fails with [`Probe::ProcessList`].
pub fn find_candidates(output: &str, binary: &str) -> Result<Vec<Candidate>> {
    let rows = parse_process_table(output);
    if rows.is_empty() {
        return Err(ScanError::parse(
            Probe::ProcessList,
            "no process row could be parsed",
            output,
        ));
    }
    Ok(rows
        .into_iter()
        .filter(|row| is_candidate(row, binary))
        .map(Candidate::from_row)
        .collect())
}

/// Turn launch arguments into a flag map.
///
/// `--key=value` becomes `key -> value` (split on the first `=`), a bare
/// `--key` becomes `key -> ""`. Leading dashes are dropped from keys; a later
/// duplicate overrides an earlier one, as it does for the server.
pub fn parse_flags<'a>(tokens: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    let mut flags = BTreeMap::new();
    for token in tokens {
        let (key, value) = token.split_once('=').unwrap_or((token, ""));
        let key = key.trim_start_matches('-');
        if key.is_empty() {
            continue;
        }
        flags.insert(key.to_string(), value.to_string());
    }
    flags
}

fn listing_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{1,2})$").expect("valid regex"))
}

/// First whitespace-separated token of `line` shaped like `N.N.N`.
#[must_use]
pub fn listing_version(line: &str) -> Option<Version> {
    line.split_whitespace()
        .find(|tok| listing_version_re().is_match(tok))
        .and_then(|tok| tok.parse().ok())
}

/// Parse `ps -eo pid=,args=` into `pid -> full command line`.
pub fn parse_cmdline_table(output: &str) -> HashMap<u32, String> {
    output
        .lines()
        .filter_map(|line| {
            let (fields, args) = split_leading_fields(line, 1).ok()?;
            let pid = parse_pid("PID", fields[0]).ok()?;
            Some((pid, args.to_string()))
        })
        .collect()
}
