//! `mysqlscan config` - CLI configuration management.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: ConfigArgs) -> Result<std::process::ExitCode> {
    match args.command {
        ConfigCommands::Show => show_config(&ctx)?,
        ConfigCommands::Set { key, value } => set_config(ctx, &key, &value)?,
        ConfigCommands::Path => println!("{}", ctx.config_path.display()),
    }
    Ok(std::process::ExitCode::SUCCESS)
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    if ctx.output_format.print_document(config)? {
        return Ok(());
    }
    match ctx.output_format {
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            wtr.write_record(["key", "value"])?;
            for (key, value) in entries(config) {
                wtr.write_record([key, value.as_str()])?;
            }
            wtr.flush()?;
        }
        _ => {
            println!("{}", "Current Configuration:".bold());
            println!();
            for (key, value) in entries(config) {
                println!("  {} {}", format!("{key}:").bold(), value);
            }
            println!();
            println!("{}", format!("File: {}", ctx.config_path.display()).dimmed());
        }
    }

    Ok(())
}

fn entries(config: &crate::config::Config) -> Vec<(&'static str, String)> {
    let d = &config.discovery;
    vec![
        (
            "output_format",
            config.output_format.unwrap_or_default().name(),
        ),
        ("binary", d.binary.clone()),
        ("command_timeout_secs", d.command_timeout_secs.to_string()),
        ("concurrency", d.concurrency.to_string()),
        ("port_selection", d.port_selection.to_string()),
        ("failure_policy", format!("{:?}", d.failure_policy).to_lowercase()),
        ("socket_tool", d.socket_tool.program().to_string()),
        ("ps_program", d.ps_program.clone()),
    ]
}

fn set_config(ctx: Context, key: &str, value: &str) -> Result<()> {
    let mut config = ctx.config;
    config.set(key, value)?;
    config.save(&ctx.config_path)?;
    println!("{} {} set to {}.", "Success:".green().bold(), key, value.cyan());
    Ok(())
}
