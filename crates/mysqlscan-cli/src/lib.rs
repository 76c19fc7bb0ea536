//! # mysqlscan-cli
//!
//! Command-line front end for MySQL instance discovery.
//!
//! ## Features
//!
//! - **Discovery**: owner, binary, version, endpoint and options file per instance
//! - **Connect targets**: `--targets` prints one `host:port` or `unix:/path` per line
//! - **Multiple output formats**: Pretty tables, JSON, CSV, YAML
//! - **Persistent defaults**: `mysqlscan config set` writes a TOML config file

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
