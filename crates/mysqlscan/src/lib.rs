//! Discover the MySQL servers running on this host.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mysqlscan::{discover, DiscoveryConfig};
//!
//! #[tokio::main]
//! async fn main() -> mysqlscan::Result<()> {
//!     let report = discover(DiscoveryConfig::default()).await?;
//!
//!     for inst in &report.instances {
//!         println!("pid {} version {}", inst.pid, inst.version);
//!         if let Some(target) = inst.connect_target("127.0.0.1") {
//!             println!("  connect via {target}");
//!         }
//!         println!("  options file: {:?}", inst.config_file());
//!     }
//!     for failure in &report.failures {
//!         eprintln!("pid {}: {}", failure.pid, failure.error);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Probing needs `ps`, `netstat` (or `ss`) and read access to the server
//! binary. Without root the socket table only shows the caller's own
//! processes, so other users' instances come back without an endpoint.

#![doc(html_root_url = "https://docs.rs/mysqlscan/0.3.0")]

// Re-export core types
pub use mysqlscan_core::*;

// Re-export discovery
pub use mysqlscan_probe::{
    discover, CommandOutput, CommandRunner, CommandSpec, Discovery, DiscoveryConfig,
    FailurePolicy, PortSelection, SocketTool, StaticRunner, StaticUsers, SystemRunner,
    SystemUsers, UserDirectory,
};

/// Lower-level probes and parsers
pub use mysqlscan_probe as probe;

// Re-export runtime for convenience
pub use tokio;
pub use serde;
pub use serde_json;
