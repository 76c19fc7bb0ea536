//! # mysqlscan-probe
//!
//! Finds the MySQL servers running on this host and works out how each one
//! was started: owner, binary, version, listening endpoint and options file.
//!
//! Everything is read from the outside. No server connection is made; the
//! probes only run `ps`, `netstat` (or `ss`) and the server binary itself.
//!
//! ## Data Flow
//!
//! ```text
//! Shared listings (once per run, any failure aborts)
//!   netstat -xnlp + netstat -tnlp -> SocketTable   (pid -> Endpoint)
//!   ps -ef                        -> Vec<Candidate> (listing order)
//!   ps -eo pid=,args=             -> pid -> cmdline (best effort)
//!
//! Per candidate (bounded concurrency, listing order kept)
//!   user lookup  -> OsUser
//!   <binary> --verbose --version -> Version
//!   <binary> --verbose --help    -> search order -> ConfigLocation
//!   SocketTable[pid]             -> Endpoint
//!   -> Instance | InstanceFailure
//!
//! -> DiscoveryReport
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysqlscan_probe::{discover, DiscoveryConfig};
//!
//! let report = discover(DiscoveryConfig::default()).await?;
//! for inst in &report.instances {
//!     println!("{} {} {:?}", inst.pid, inst.version, inst.port());
//! }
//! ```

pub mod config;
pub mod defaults;
pub mod discovery;
mod parse;
pub mod process;
pub mod runner;
pub mod sockets;
pub mod users;
pub mod version;

pub use config::{DiscoveryConfig, FailurePolicy, PortSelection, SocketTool};
pub use discovery::{discover, Discovery};
pub use parse::RowError;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, StaticRunner, SystemRunner};
pub use users::{StaticUsers, SystemUsers, UserDirectory};
