//! Discovery report -- one point-in-time snapshot of running instances.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::instance::Instance;
use crate::error::ScanError;

/// A candidate process whose probes failed.
#[derive(Debug, Serialize)]
pub struct InstanceFailure {
    /// Process id of the candidate
    pub pid: u32,
    /// Originating process-table row
    pub process_line: String,
    /// What went wrong
    #[serde(serialize_with = "display_error")]
    pub error: ScanError,
}

/// Result of one discovery call.
#[derive(Debug, Serialize)]
pub struct DiscoveryReport {
    /// When the snapshot was taken
    pub collected_at: DateTime<Utc>,
    /// Server binary name that was searched for
    pub binary: String,
    /// Fully probed instances, in process-table order
    pub instances: Vec<Instance>,
    /// Candidates that could not be probed
    pub failures: Vec<InstanceFailure>,
}

impl DiscoveryReport {
    /// Returns true if every candidate process was probed successfully
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Find an instance by process id
    #[must_use]
    pub fn instance(&self, pid: u32) -> Option<&Instance> {
        self.instances.iter().find(|i| i.pid == pid)
    }

    /// Number of candidate processes seen, probed or not
    #[must_use]
    pub fn candidates(&self) -> usize {
        self.instances.len() + self.failures.len()
    }
}

fn display_error<S: Serializer>(err: &ScanError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}
