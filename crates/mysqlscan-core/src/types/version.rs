use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server version as a `major.minor.patch` triple.
///
/// A version is always fully populated; there is no partial form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major release
    pub major: u32,
    /// Minor release
    pub minor: u32,
    /// Patch level
    pub patch: u32,
}

impl Version {
    /// Create a version from its three components
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = String;

    /// Parses exactly three dot-separated unsigned integers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = |label: &str| -> Result<u32, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {label} component in {s:?}"))?
                .parse::<u32>()
                .map_err(|e| format!("bad {label} component in {s:?}: {e}"))
        };
        let version = Self::new(next("major")?, next("minor")?, next("patch")?);
        if parts.next().is_some() {
            return Err(format!("more than three components in {s:?}"));
        }
        Ok(version)
    }
}
