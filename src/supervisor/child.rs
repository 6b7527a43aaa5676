//! Managed tunnel process: spawn, liveness probing, escalating termination.
//!
//! The child runs `wireproxy -c <config>` with stdout and stderr redirected
//! to the session log and is made leader of its own process group, so one
//! group-directed signal reaches it and any descendants. Termination
//! escalates: SIGTERM to the group, a bounded liveness-poll wait, then
//! SIGKILL and a blocking reap.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use super::watchdog::WatchdogHandle;
use crate::{DaemonError, Result};

/// Group-directed signal selector for [`signal_group`].
#[derive(Debug, Clone, Copy)]
pub(crate) enum GroupSignal {
    /// Request graceful shutdown (SIGTERM).
    Terminate,
    /// Force immediate death (SIGKILL).
    Kill,
}

/// Send a signal to the child's whole process group.
///
/// Invalid pids are ignored so a reused or cleared pid is never signalled.
#[cfg(unix)]
pub(crate) fn signal_group(pid: i32, signal: GroupSignal) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if pid <= 0 {
        return;
    }
    let sig = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    if let Err(err) = killpg(Pid::from_raw(pid), sig) {
        tracing::debug!(pid, %err, "process group signal failed");
    }
}

#[cfg(not(unix))]
pub(crate) fn signal_group(_pid: i32, _signal: GroupSignal) {}

/// Manages a single spawned tunnel process instance.
#[derive(Debug)]
pub struct ChildProcess {
    binary_path: PathBuf,
    term_grace: Duration,
    term_poll: Duration,
    child: Option<Child>,
    pid: i32,
    terminated: bool,
    watchdog: Option<WatchdogHandle>,
}

impl ChildProcess {
    /// Construct a process manager for the executable at `binary_path`.
    ///
    /// `term_grace` bounds the SIGTERM wait; `term_poll` is the liveness
    /// poll interval during that wait.
    #[must_use]
    pub fn new(binary_path: PathBuf, term_grace: Duration, term_poll: Duration) -> Self {
        Self {
            binary_path,
            term_grace,
            term_poll,
            child: None,
            pid: -1,
            terminated: false,
            watchdog: None,
        }
    }

    /// Spawn the tunnel process for `config_path`.
    ///
    /// `log_handle` becomes the child's stdout; a duplicate becomes its
    /// stderr. The child is placed in a fresh process group whose id equals
    /// its pid.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Spawn` if a child already exists, the log
    /// handle cannot be duplicated, or fork/exec fails. No state is
    /// retained on failure.
    pub fn spawn(&mut self, config_path: &Path, log_handle: File) -> Result<()> {
        if self.child.is_some() {
            return Err(DaemonError::Spawn(
                "a tunnel process is already managed".into(),
            ));
        }

        let stderr_handle = log_handle.try_clone().map_err(|err| {
            DaemonError::Spawn(format!("failed to duplicate log handle: {err}"))
        })?;

        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-c")
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_handle))
            .stderr(Stdio::from(stderr_handle))
            .kill_on_drop(true);

        // New process group so the whole subtree can be signalled at once.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|err| DaemonError::Spawn(format!("fork/exec failed: {err}")))?;

        let pid = child
            .id()
            .and_then(|id| i32::try_from(id).ok())
            .unwrap_or(-1);

        info!(pid, config = %config_path.display(), "tunnel process spawned");

        self.child = Some(child);
        self.pid = pid;
        self.terminated = false;
        Ok(())
    }

    /// Pid of the managed process, or `-1` when none is running.
    #[must_use]
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Non-blocking liveness probe.
    ///
    /// Observing termination reaps the zombie; later calls keep returning
    /// `false`.
    pub fn is_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        matches!(child.try_wait(), Ok(None))
    }

    /// Attach the armed log watchdog for this session.
    pub fn attach_watchdog(&mut self, handle: WatchdogHandle) {
        self.watchdog = Some(handle);
    }

    /// Whether the attached watchdog has flagged a sustained network drop.
    #[must_use]
    pub fn has_network_drop(&self) -> bool {
        self.watchdog
            .as_ref()
            .is_some_and(WatchdogHandle::network_drop)
    }

    /// Stop and join the attached watchdog, if any.
    pub async fn stop_watchdog(&mut self) {
        if let Some(mut handle) = self.watchdog.take() {
            handle.stop().await;
        }
    }

    /// Terminate the process group with escalation.
    ///
    /// SIGTERM first; if the child is still alive after the grace window,
    /// SIGKILL and a blocking reap. Also stops the watchdog and clears all
    /// process state. A second call after termination returns
    /// `"Not running"`.
    pub async fn terminate(&mut self) -> String {
        if self.child.is_none() || self.terminated {
            return "Not running".to_owned();
        }

        signal_group(self.pid, GroupSignal::Terminate);

        let polls = (self.term_grace.as_millis() / self.term_poll.as_millis().max(1)).max(1);
        let mut graceful = false;
        for _ in 0..polls {
            tokio::time::sleep(self.term_poll).await;
            if !self.is_alive() {
                graceful = true;
                break;
            }
        }

        let method = if graceful {
            "Graceful termination"
        } else {
            signal_group(self.pid, GroupSignal::Kill);
            if let Some(child) = self.child.as_mut() {
                if let Err(err) = child.kill().await {
                    warn!(pid = self.pid, %err, "force kill failed");
                }
            }
            "Force killed"
        };

        info!(pid = self.pid, method, "tunnel process terminated");

        self.stop_watchdog().await;
        self.cleanup();
        method.to_owned()
    }

    fn cleanup(&mut self) {
        self.child = None;
        self.pid = -1;
        self.terminated = true;
    }
}
