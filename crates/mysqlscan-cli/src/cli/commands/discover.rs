//! `mysqlscan discover` - list running server instances.

use anyhow::Result;
use colored::Colorize;
use mysqlscan::{DiscoveryConfig, DiscoveryReport, FailurePolicy, Instance};
use serde::Serialize;
use std::process::ExitCode;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::cli::args::DiscoverArgs;
use crate::output::OutputFormat;

/// One flat row per instance, shared by the table and CSV renderings.
#[derive(Tabled, Serialize)]
struct InstanceRow {
    #[tabled(rename = "PID")]
    pid: u32,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Socket")]
    socket: String,
    #[tabled(rename = "Options file")]
    config_file: String,
    #[tabled(rename = "Binary")]
    binary: String,
}

impl From<&Instance> for InstanceRow {
    fn from(inst: &Instance) -> Self {
        let display = |p: Option<&std::path::Path>| {
            p.map(|p| p.display().to_string()).unwrap_or_default()
        };
        Self {
            pid: inst.pid,
            user: inst.user.name.clone(),
            version: inst.version.to_string(),
            port: inst.port().map(|p| p.to_string()).unwrap_or_default(),
            socket: display(inst.socket_file()),
            config_file: display(inst.config_file()),
            binary: inst.binary.display().to_string(),
        }
    }
}

pub async fn execute(ctx: Context, args: DiscoverArgs) -> Result<ExitCode> {
    let config = merge(ctx.config.discovery.clone(), &args);
    let report = mysqlscan::discover(config).await?;

    if args.targets {
        print_targets(&report, &args.host);
    } else if !ctx.output_format.print_document(&report)? {
        match ctx.output_format {
            OutputFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(std::io::stdout());
                for inst in &report.instances {
                    wtr.serialize(InstanceRow::from(inst))?;
                }
                wtr.flush()?;
            }
            _ => print_report_pretty(&report, &ctx),
        }
    }

    // Failures go to stderr for machine formats; the table already shows them.
    if !matches!(ctx.output_format, OutputFormat::Pretty) || args.targets {
        for failure in &report.failures {
            eprintln!("pid {}: {}", failure.pid, failure.error);
        }
    }

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Command-line flags override the config file.
fn merge(mut config: DiscoveryConfig, args: &DiscoverArgs) -> DiscoveryConfig {
    if let Some(binary) = &args.binary {
        config.binary.clone_from(binary);
    }
    if let Some(secs) = args.timeout {
        config.command_timeout_secs = secs;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(selection) = args.port_selection {
        config.port_selection = selection;
    }
    if let Some(tool) = args.socket_tool {
        config.socket_tool = tool;
    }
    if args.strict {
        config.failure_policy = FailurePolicy::Abort;
    }
    config
}

fn print_targets(report: &DiscoveryReport, host: &str) {
    for inst in &report.instances {
        if let Some(target) = inst.connect_target(host) {
            println!("{target}");
        }
    }
}

fn print_report_pretty(report: &DiscoveryReport, ctx: &Context) {
    if report.instances.is_empty() && report.failures.is_empty() {
        println!("No running {} found.", report.binary.cyan());
        return;
    }

    println!(
        "{} {} of {} {}",
        "Instances:".bold(),
        report.instances.len().to_string().green().bold(),
        report.candidates(),
        format!("({})", report.binary).dimmed()
    );

    if !report.instances.is_empty() {
        let rows: Vec<InstanceRow> = report.instances.iter().map(InstanceRow::from).collect();
        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
    }

    if ctx.verbose {
        for inst in &report.instances {
            println!();
            println!("{} {}", "PID".bold(), inst.pid.to_string().cyan());
            println!("  {} {}", "Version:".bold(), inst.version_text);
            if let Some(ep) = &inst.endpoint {
                if ep.listen_ports.len() > 1 {
                    let ports: Vec<String> = ep.listen_ports.iter().map(ToString::to_string).collect();
                    println!("  {} {}", "Listening:".bold(), ports.join(", "));
                }
            }
            let searched: Vec<String> =
                inst.config.candidates.iter().map(|p| p.display().to_string()).collect();
            println!("  {} {}", "Options search:".bold(), searched.join(" "));
            if let Some(parent) = &inst.parent_cmdline {
                println!("  {} {}", "Parent:".bold(), parent.dimmed());
            }
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("{}", "Failed:".bold().red());
        for failure in &report.failures {
            println!("  {} pid {}: {}", "-".red(), failure.pid, failure.error);
        }
    }

    println!();
    println!(
        "{}",
        format!("Collected at {}", report.collected_at.format("%Y-%m-%d %H:%M:%S UTC")).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysqlscan::PortSelection;

    #[test]
    fn flags_override_config() {
        let base = DiscoveryConfig {
            binary: "mariadbd".into(),
            concurrency: 8,
            ..DiscoveryConfig::default()
        };
        let args = DiscoverArgs {
            timeout: Some(3),
            port_selection: Some(PortSelection::Highest),
            strict: true,
            ..DiscoverArgs::default()
        };
        let merged = merge(base, &args);
        assert_eq!(merged.binary, "mariadbd");
        assert_eq!(merged.concurrency, 8);
        assert_eq!(merged.command_timeout_secs, 3);
        assert_eq!(merged.port_selection, PortSelection::Highest);
        assert_eq!(merged.failure_policy, FailurePolicy::Abort);
    }
}
