use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::DEFAULT_STORE_TIMEOUT;
use serde::Deserialize;

/// Per-terminal settings read from `redeem.toml`; command-line flags win.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerminalProfile {
    pub server_url: Option<String>,
    pub database_url: Option<String>,
    pub store_timeout_secs: Option<u64>,
    pub receipt_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Http(String),
    Database(String),
}

pub fn load_profile(path: &Path) -> anyhow::Result<TerminalProfile> {
    match fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw)
            .with_context(|| format!("terminal profile '{}' is malformed", path.display())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(TerminalProfile::default()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to read terminal profile '{}'", path.display())),
    }
}

impl TerminalProfile {
    /// Applies `overrides` on top of `self`. Naming either store on the
    /// command line replaces both store fields from the file.
    pub fn merge(self, overrides: TerminalProfile) -> TerminalProfile {
        let (server_url, database_url) =
            if overrides.server_url.is_some() || overrides.database_url.is_some() {
                (overrides.server_url, overrides.database_url)
            } else {
                (self.server_url, self.database_url)
            };
        TerminalProfile {
            server_url,
            database_url,
            store_timeout_secs: overrides.store_timeout_secs.or(self.store_timeout_secs),
            receipt_dir: overrides.receipt_dir.or(self.receipt_dir),
        }
    }

    pub fn store_target(&self) -> anyhow::Result<StoreTarget> {
        match (&self.server_url, &self.database_url) {
            (Some(url), None) => Ok(StoreTarget::Http(url.trim().to_string())),
            (None, Some(url)) => Ok(StoreTarget::Database(url.trim().to_string())),
            (Some(_), Some(_)) => bail!("configure either server_url or database_url, not both"),
            (None, None) => bail!("no token store configured; pass --server-url or --database-url"),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        match self.store_timeout_secs {
            Some(0) | None => DEFAULT_STORE_TIMEOUT,
            Some(secs) => Duration::from_secs(secs),
        }
    }
}

#[cfg(test)]
#[path = "tests/profile_tests.rs"]
mod tests;
