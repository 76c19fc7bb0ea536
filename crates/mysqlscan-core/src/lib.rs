//! Core types and errors for mysqlscan.
//!
//! This crate provides the foundational types shared by the discovery
//! probes and their callers:
//!
//! - **Types**: [`Instance`], [`Endpoint`], [`Version`] and the
//!   [`DiscoveryReport`] a discovery call returns
//! - **Errors**: every failure a probe can hit, as [`ScanError`]
//!
//! Nothing here performs I/O. Values are built fresh by each discovery call
//! and dropped once the caller is done with them.
//!
//! # Example
//!
//! ```rust,ignore
//! use mysqlscan_core::{DiscoveryReport, Result};
//!
//! fn print_targets(report: &DiscoveryReport) -> Result<()> {
//!     for inst in &report.instances {
//!         if let Some(target) = inst.connect_target("127.0.0.1") {
//!             println!("{} -> {target}", inst.pid);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/mysqlscan-core/0.3.0")]

mod error;
pub mod types;

pub use error::{Probe, Result, ScanError};
pub use types::*;
