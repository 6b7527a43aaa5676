//! Per-session log file with fixed header and footer blocks.
//!
//! One log file exists per tunnel session, named
//! `<unix_seconds>_<config_stem>.log`. The supervisor writes the header on
//! creation and the footer on finalization; everything in between is the
//! child's own output, written through the inherited handle. The file name
//! and the header/footer layout are read by operator tooling, so both are
//! stable contracts.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{Local, Utc};
use tracing::warn;

use crate::{DaemonError, Result};

const RULE: &str =
    "================================================================================";

#[derive(Debug, Default)]
struct LogState {
    file: Option<File>,
    current_path: PathBuf,
}

/// Creates, hands out, and finalizes the active session log.
///
/// All writes by the supervisor are serialized by an internal lock. The
/// child holds its own duplicated handle and writes independently.
#[derive(Debug)]
pub struct SessionLog {
    logs_dir: PathBuf,
    configs_dir: PathBuf,
    state: Mutex<LogState>,
}

impl SessionLog {
    /// Construct a session log rooted at `logs_dir`.
    ///
    /// `configs_dir` is only used to render the `Configuration File:` header
    /// line; the log never reads the configuration itself.
    #[must_use]
    pub fn new(logs_dir: PathBuf, configs_dir: PathBuf) -> Self {
        Self {
            logs_dir,
            configs_dir,
            state: Mutex::new(LogState::default()),
        }
    }

    /// Create a timestamped log file and write the header.
    ///
    /// Any previously open log is closed first. Returns the new path.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::LogIo` if the file cannot be created or the
    /// header cannot be written.
    pub fn create(&self, config_name: &str, version: &str) -> Result<PathBuf> {
        let mut state = self.lock();

        // Drop any stale handle before allocating the new file.
        state.file = None;

        let now = Local::now();
        let unix = Utc::now().timestamp();
        let stem = config_name.strip_suffix(".conf").unwrap_or(config_name);
        let path = self.logs_dir.join(format!("{unix}_{stem}.log"));

        let mut file = File::create(&path).map_err(|err| {
            DaemonError::LogIo(format!("Failed to create log file: {}: {err}", path.display()))
        })?;

        let header = format!(
            "{RULE}\n\
             WireProxy Server Log\n\
             {RULE}\n\
             Start Time: {start}\n\
             Unix Timestamp: {unix}\n\
             Configuration: {config_name}\n\
             WireProxy Version: {version}\n\
             Configuration File: {config_file}\n\
             \n\
             Process Output:\n\
             {RULE}\n",
            start = now.format("%Y-%m-%d %H:%M:%S"),
            config_file = self.configs_dir.join(config_name).display(),
        );
        file.write_all(header.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| {
                DaemonError::LogIo(format!(
                    "Failed to write log header: {}: {err}",
                    path.display()
                ))
            })?;

        state.file = Some(file);
        state.current_path = path.clone();
        Ok(path)
    }

    /// Duplicate the live handle for inheritance as a child's stdout/stderr.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::LogIo` if no log is open or the descriptor
    /// cannot be duplicated.
    pub fn handle(&self) -> Result<File> {
        let state = self.lock();
        let file = state
            .file
            .as_ref()
            .ok_or_else(|| DaemonError::LogIo("No log file is currently open".into()))?;
        file.try_clone()
            .map_err(|err| DaemonError::LogIo(format!("Failed to duplicate log handle: {err}")))
    }

    /// Path of the active log, or the last finalized one.
    ///
    /// Empty until the first `create`. Finalization does not clear it, so
    /// `state` replies can keep pointing at the most recent session log.
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        self.lock().current_path.clone()
    }

    /// Whether a log file is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().file.is_some()
    }

    /// Write the teardown footer and close the file.
    ///
    /// Idempotent no-op when no log is open. Footer write failures are
    /// logged and the handle is closed regardless; there is no caller that
    /// could meaningfully recover at this point in a teardown.
    pub fn finalize(&self, reason: &str) {
        let mut state = self.lock();
        let Some(mut file) = state.file.take() else {
            return;
        };

        let now = Local::now();
        let unix = Utc::now().timestamp();
        let footer = format!(
            "\n\
             {RULE}\n\
             WireProxy Server Teardown\n\
             {RULE}\n\
             Stop Time: {stop}\n\
             Unix Timestamp: {unix}\n\
             Status: Initiating shutdown\n\
             Shutdown Method: {reason}\n\
             Final Status: Process terminated\n\
             {RULE}\n\
             End of log\n\
             {RULE}\n",
            stop = now.format("%Y-%m-%d %H:%M:%S"),
        );

        if let Err(err) = file.write_all(footer.as_bytes()).and_then(|()| file.flush()) {
            warn!(%err, path = %state.current_path.display(), "failed to write log footer");
        }
        // Dropping the handle closes the supervisor's side; the child may
        // still hold its inherited descriptor until it exits.
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
