//! OS user lookups for process owners.

use mysqlscan_core::{OsUser, Result, ScanError};
#[cfg(unix)]
use nix::unistd::{Uid, User};
use std::collections::HashMap;
use std::path::PathBuf;

/// Resolves the owner name printed in the process table to an account.
pub trait UserDirectory: Send + Sync {
    /// Look up an account by the name (or numeric uid) from the process table.
    fn lookup(&self, name: &str) -> Result<OsUser>;
}

/// The host's user database via `getpwnam(3)` / `getpwuid(3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUsers;

#[cfg(unix)]
impl UserDirectory for SystemUsers {
    fn lookup(&self, name: &str) -> Result<OsUser> {
        let lookup_err = |e: nix::Error| ScanError::UserLookup {
            user: name.to_string(),
            reason: e.to_string(),
        };

        let found = match User::from_name(name).map_err(lookup_err)? {
            Some(user) => Some(user),
            // ps prints the numeric uid when the name does not fit its column
            None => match name.parse::<u32>() {
                Ok(uid) => User::from_uid(Uid::from_raw(uid)).map_err(lookup_err)?,
                Err(_) => None,
            },
        };

        found
            .map(|user| OsUser {
                name: user.name,
                uid: user.uid.as_raw(),
                home_dir: user.dir,
            })
            .ok_or_else(|| ScanError::UnknownUser(name.to_string()))
    }
}

#[cfg(not(unix))]
impl UserDirectory for SystemUsers {
    fn lookup(&self, name: &str) -> Result<OsUser> {
        Err(ScanError::UserLookup {
            user: name.to_string(),
            reason: "no user database on this platform".into(),
        })
    }
}

/// A fixed set of accounts held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticUsers {
    users: HashMap<String, OsUser>,
}

impl StaticUsers {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account
    #[must_use]
    pub fn with_user(mut self, name: &str, uid: u32, home_dir: impl Into<PathBuf>) -> Self {
        self.users.insert(
            name.to_string(),
            OsUser {
                name: name.to_string(),
                uid,
                home_dir: home_dir.into(),
            },
        );
        self
    }
}

impl UserDirectory for StaticUsers {
    fn lookup(&self, name: &str) -> Result<OsUser> {
        self.users
            .get(name)
            .or_else(|| {
                let uid = name.parse::<u32>().ok()?;
                self.users.values().find(|u| u.uid == uid)
            })
            .cloned()
            .ok_or_else(|| ScanError::UnknownUser(name.to_string()))
    }
}
