//! Plain-text audit log writer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;

use super::{AuditCategory, AuditSink};
use crate::{DaemonError, Result};

/// Appends timestamped audit lines to `<logs_dir>/audit.log`.
///
/// Lines have the form `[YYYY-MM-DD HH:MM:SS] [CATEGORY] message` and are
/// flushed individually so the trail survives an abrupt exit. The file is
/// reopened lazily if a write ever finds it closed.
pub struct FileAuditLog {
    path: PathBuf,
    state: Mutex<Option<BufWriter<File>>>,
}

impl FileAuditLog {
    /// Construct a writer storing its trail in `logs_dir`.
    ///
    /// Creates `logs_dir` if needed and records an initialization line.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Config`] if the directory or file cannot be
    /// created.
    pub fn new(logs_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&logs_dir).map_err(|err| {
            DaemonError::Config(format!(
                "failed to create audit log directory {}: {err}",
                logs_dir.display()
            ))
        })?;

        let path = logs_dir.join("audit.log");
        let writer = Self {
            path,
            state: Mutex::new(None),
        };
        writer.record(AuditCategory::Info, "Audit logger initialized")?;
        Ok(writer)
    }

    /// Path of the audit trail file.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn open_append(&self) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| {
                DaemonError::Config(format!(
                    "failed to open audit log {}: {err}",
                    self.path.display()
                ))
            })?;
        Ok(BufWriter::new(file))
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, category: AuditCategory, message: &str) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if guard.is_none() {
            *guard = Some(self.open_append()?);
        }

        if let Some(writer) = guard.as_mut() {
            let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            writeln!(writer, "[{stamp}] {category} {message}")
                .and_then(|()| writer.flush())
                .map_err(|err| {
                    DaemonError::Io(format!("audit write failed: {err}"))
                })?;
        }

        Ok(())
    }
}
