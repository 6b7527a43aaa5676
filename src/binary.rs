//! Managed-binary location and version probing.
//!
//! The daemon does not download or install the executable; it only needs a
//! resolvable path. Acquisition is an external concern handled by the
//! installer tooling that populates the base directory.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

/// Locates the managed executable and probes its version string.
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    binary_path: PathBuf,
}

impl BinaryLocator {
    /// Construct a locator for the executable at `binary_path`.
    #[must_use]
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Path to the managed executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.binary_path
    }

    /// Whether the executable exists as a regular file.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.binary_path.is_file()
    }

    /// Run `<binary> -v` and return its trimmed output.
    ///
    /// Never fails: probe problems degrade to an `Unknown (...)` string so
    /// the session log header always has something to print.
    pub async fn version(&self) -> String {
        if !self.exists() {
            return "Unknown (binary not found)".to_owned();
        }

        match Command::new(&self.binary_path).arg("-v").output().await {
            Ok(output) => {
                let text = String::from_utf8_lossy(&output.stdout);
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    "Unknown (failed to run)".to_owned()
                } else {
                    trimmed.to_owned()
                }
            }
            Err(err) => {
                debug!(%err, binary = %self.binary_path.display(), "version probe failed");
                "Unknown (failed to run)".to_owned()
            }
        }
    }
}
