//! Data model for discovered server instances.

pub mod endpoint;
pub mod instance;
pub mod report;
pub mod version;

pub use endpoint::{ConnectTarget, Endpoint};
pub use instance::{ConfigLocation, Instance, OsUser};
pub use report::{DiscoveryReport, InstanceFailure};
pub use version::Version;
