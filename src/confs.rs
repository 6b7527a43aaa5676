//! Tunnel configuration store.
//!
//! Resolves configuration names against the `wireproxy_confs` directory.
//! Names are normalized to always carry the `.conf` suffix, so clients may
//! pass either `sweden` or `sweden.conf` and reach the same file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{DaemonError, Result};

/// Read-only view over the tunnel configuration directory.
#[derive(Debug, Clone)]
pub struct ConfStore {
    configs_dir: PathBuf,
}

impl ConfStore {
    /// Construct a store rooted at `configs_dir`.
    #[must_use]
    pub fn new(configs_dir: PathBuf) -> Self {
        Self { configs_dir }
    }

    /// Append the `.conf` suffix when absent. Idempotent.
    #[must_use]
    pub fn normalize_name(name: &str) -> String {
        if name.ends_with(".conf") {
            name.to_owned()
        } else {
            format!("{name}.conf")
        }
    }

    /// Whether the normalized name resolves to a regular file.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    /// Resolved path for the normalized name.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.configs_dir.join(Self::normalize_name(name))
    }

    /// The directory this store reads from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.configs_dir
    }

    /// List available configuration file names, sorted ascending.
    ///
    /// Only regular files with a `.conf` extension are included. A missing
    /// directory yields an empty list rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Io` if the directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.configs_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.configs_dir).map_err(|err| {
            DaemonError::Io(format!(
                "failed to read {}: {err}",
                self.configs_dir.display()
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|err| DaemonError::Io(format!("failed to read directory entry: {err}")))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "conf") {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_owned());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
