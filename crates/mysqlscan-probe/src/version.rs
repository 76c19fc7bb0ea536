//! Version probe: asks the server binary for its version.

use mysqlscan_core::{Probe, Result, ScanError, Version};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::runner::{CommandRunner, CommandSpec};

/// Output of the version probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Parsed triple
    pub version: Version,
    /// Trimmed banner
    pub text: String,
}

fn banner_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The triple sits at the start of the banner, or right after the
    // `<path>  Ver ` prefix the server prints in front of it.
    RE.get_or_init(|| {
        Regex::new(r"^(?:\S+\s+Ver\s+)?(\d+)\.(\d+)\.(\d+)").expect("valid regex")
    })
}

/// Parse a version banner such as `8.0.34-0ubuntu0.22.04.1` or
/// `/usr/sbin/mysqld  Ver 5.7.31 for Linux on x86_64 (MySQL Community Server (GPL))`.
pub fn parse_version_banner(text: &str) -> Result<Version> {
    let trimmed = text.trim();
    let caps = banner_re().captures(trimmed).ok_or_else(|| {
        ScanError::parse(Probe::Version, "no leading major.minor.patch version", trimmed)
    })?;

    let component = |i: usize| {
        caps[i].parse::<u32>().map_err(|e| {
            ScanError::parse(Probe::Version, format!("version component out of range: {e}"), trimmed)
        })
    };
    Ok(Version::new(component(1)?, component(2)?, component(3)?))
}

/// Run `<binary> <version_args>` and parse its banner.
pub async fn probe_version<R>(runner: &R, binary: &Path, args: &[String]) -> Result<VersionInfo>
where
    R: CommandRunner + ?Sized,
{
    let cmd = CommandSpec::new(binary.display().to_string(), args.iter().cloned());
    let output = runner.combined_output(&cmd).await?;
    let version = parse_version_banner(&output)?;
    Ok(VersionInfo {
        version,
        text: output.trim().to_string(),
    })
}
