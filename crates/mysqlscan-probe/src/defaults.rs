//! Options file location: the server's own search order plus `--defaults-file`.

use mysqlscan_core::{ConfigLocation, OsUser, Probe, Result, ScanError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::runner::{CommandRunner, CommandSpec};

/// Line in `--verbose --help` output announcing the search order.
pub const SEARCH_ORDER_BANNER: &str =
    "Default options are read from the following files in the given order";

/// Flag that replaces the search order with a single file.
pub const DEFAULTS_FILE_FLAG: &str = "defaults-file";

/// Extract the search order from help output, expanding `~` to `home`.
pub fn parse_search_paths(help: &str, home: &Path) -> Result<Vec<PathBuf>> {
    let mut lines = help.lines();
    lines
        .by_ref()
        .find(|l| l.trim_start().starts_with(SEARCH_ORDER_BANNER))
        .ok_or_else(|| {
            ScanError::parse(Probe::DefaultsSearch, "search order section not found", help)
        })?;

    let paths_line = lines.next().unwrap_or_default();
    let home = home.to_string_lossy();
    let paths: Vec<PathBuf> = paths_line
        .split_whitespace()
        .map(|tok| PathBuf::from(shellexpand::tilde_with_context(tok, || Some(&*home)).into_owned()))
        .collect();

    if paths.is_empty() {
        return Err(ScanError::parse(
            Probe::DefaultsSearch,
            "search order section lists no files",
            help,
        ));
    }
    Ok(paths)
}

/// Explicit options file from launch flags (either spelling of the flag name).
#[must_use]
pub fn explicit_defaults_file(flags: &BTreeMap<String, String>) -> Option<PathBuf> {
    flags
        .iter()
        .find(|(k, v)| k.replace('_', "-") == DEFAULTS_FILE_FLAG && !v.is_empty())
        .map(|(_, v)| PathBuf::from(v))
}

/// Candidate list: the explicit file first, then the search order.
#[must_use]
pub fn candidate_paths(explicit: Option<PathBuf>, search: Vec<PathBuf>) -> Vec<PathBuf> {
    explicit.into_iter().chain(search).collect()
}

/// First candidate that exists and is a regular file (symlinks followed).
#[must_use]
pub fn resolve(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|p| std::fs::metadata(p).is_ok_and(|m| m.is_file()))
        .cloned()
}

/// Run `<binary> <help_args>` and work out where the instance reads its options.
pub async fn locate_config<R>(
    runner: &R,
    binary: &Path,
    help_args: &[String],
    user: &OsUser,
    flags: &BTreeMap<String, String>,
) -> Result<ConfigLocation>
where
    R: CommandRunner + ?Sized,
{
    let cmd = CommandSpec::new(binary.display().to_string(), help_args.iter().cloned());
    let help = runner.combined_output(&cmd).await?;
    let search = parse_search_paths(&help, &user.home_dir)?;

    let candidates = candidate_paths(explicit_defaults_file(flags), search);
    let resolved = resolve(&candidates);
    debug!(?candidates, ?resolved, "options file located");

    Ok(ConfigLocation {
        candidates,
        resolved,
    })
}
