//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use mysqlscan::{PortSelection, SocketTool};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// List the MySQL servers running on this host
///
/// Correlates the process table, the socket table and the server binary's
/// own output into one record per running instance. Run as root to see
/// endpoints of processes owned by other users.
#[derive(Parser, Debug)]
#[command(name = "mysqlscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file to use instead of the platform default
    #[arg(long, env = "MYSQLSCAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover running server instances
    Discover(DiscoverArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

// ============================================================================
// Discover command
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct DiscoverArgs {
    /// Server binary name to look for
    #[arg(short, long)]
    pub binary: Option<String>,

    /// Time limit for each external command, in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// How many instances to probe at once
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Fail the whole run on the first instance that cannot be probed
    #[arg(long)]
    pub strict: bool,

    /// Port to report when a server listens on several (lowest, highest, prefer=<port>)
    #[arg(long, value_parser = parse_port_selection)]
    pub port_selection: Option<PortSelection>,

    /// Socket table source (netstat or ss)
    #[arg(long, value_parser = parse_socket_tool)]
    pub socket_tool: Option<SocketTool>,

    /// Print only connect targets, one per line
    #[arg(long)]
    pub targets: bool,

    /// Host used for TCP connect targets
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

fn parse_port_selection(s: &str) -> Result<PortSelection, String> {
    s.parse()
}

fn parse_socket_tool(s: &str) -> Result<SocketTool, String> {
    s.parse()
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Key to set (e.g., output_format, binary, port_selection)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,
}
