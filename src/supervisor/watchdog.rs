//! Passive log-tailing watchdog for sustained network failure.
//!
//! Tails the session log from end-of-file and counts consecutive lines
//! matching known unrecoverable network errors. A single spurious line is
//! tolerated: any ordinary line resets the counter, while `ERROR:`-prefixed
//! lines of other varieties leave it untouched, biasing the detector toward
//! genuinely sustained failure. On trip the watchdog flags the session and
//! SIGTERMs the child's process group; the supervisor notices the death
//! lazily on its next probe.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::child::{signal_group, GroupSignal};

/// Log substrings that indicate the tunnel has lost its network path.
const NETWORK_ERROR_PATTERNS: [&str; 2] =
    ["network is unreachable", "can't assign requested address"];

/// Builder for a per-session log watchdog.
///
/// Call [`spawn`](Self::spawn) to start the background tail task.
pub struct NetworkWatchdog {
    log_path: PathBuf,
    child_pid: i32,
    threshold: u32,
    poll_interval: Duration,
    startup_delay: Duration,
}

impl NetworkWatchdog {
    /// Construct a watchdog over `log_path` guarding the process group
    /// `child_pid` (does not start the tail yet).
    #[must_use]
    pub fn new(
        log_path: PathBuf,
        child_pid: i32,
        threshold: u32,
        poll_interval: Duration,
        startup_delay: Duration,
    ) -> Self {
        Self {
            log_path,
            child_pid,
            threshold,
            poll_interval,
            startup_delay,
        }
    }

    /// Spawn the background tail task and return a handle for controlling it.
    #[must_use]
    pub fn spawn(self) -> WatchdogHandle {
        let drop_flag = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::run(
            self.log_path,
            self.child_pid,
            self.threshold,
            self.poll_interval,
            self.startup_delay,
            Arc::clone(&drop_flag),
            cancel.clone(),
        ));

        WatchdogHandle {
            drop_flag,
            cancel,
            join_handle: Some(task),
        }
    }

    /// Core tail loop.
    async fn run(
        log_path: PathBuf,
        child_pid: i32,
        threshold: u32,
        poll_interval: Duration,
        startup_delay: Duration,
        drop_flag: Arc<AtomicBool>,
        cancel: CancellationToken,
    ) {
        // Let the log be created and the first lines land before tailing.
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(startup_delay) => {}
        }

        let mut file = match File::open(&log_path).await {
            Ok(file) => file,
            Err(err) => {
                // Absence of a tail is not fatal to the session.
                debug!(%err, path = %log_path.display(), "log tail unavailable");
                return;
            }
        };
        if let Err(err) = file.seek(SeekFrom::End(0)).await {
            debug!(%err, path = %log_path.display(), "log tail seek failed");
            return;
        }

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut consecutive: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("watchdog cancelled");
                return;
            }

            match reader.read_line(&mut line).await {
                // End of file, or a partial line still being written: wait
                // for the child to produce more output. `read_line` appends,
                // so a partial line keeps accumulating until its newline.
                Ok(0) => {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Ok(_) if line.ends_with('\n') => {
                    consecutive = observe_line(&line, consecutive);
                    line.clear();
                    if consecutive >= threshold {
                        drop_flag.store(true, Ordering::SeqCst);
                        warn!(
                            pid = child_pid,
                            consecutive, "sustained network errors, terminating tunnel process"
                        );
                        signal_group(child_pid, GroupSignal::Terminate);
                        return;
                    }
                }
                Ok(_) => {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Err(err) => {
                    debug!(%err, "log tail read failed");
                    return;
                }
            }
        }
    }
}

/// Update the consecutive-match counter for one complete log line.
fn observe_line(line: &str, consecutive: u32) -> u32 {
    let lower = line.to_lowercase();
    if NETWORK_ERROR_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
    {
        return consecutive + 1;
    }
    // Other error varieties keep the streak; ordinary output breaks it.
    if line.trim_start().starts_with("ERROR:") {
        consecutive
    } else {
        0
    }
}

/// Handle returned from [`NetworkWatchdog::spawn`] for controlling the tail.
#[derive(Debug)]
pub struct WatchdogHandle {
    drop_flag: Arc<AtomicBool>,
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl WatchdogHandle {
    /// Whether the watchdog detected a sustained network drop.
    #[must_use]
    pub fn network_drop(&self) -> bool {
        self.drop_flag.load(Ordering::SeqCst)
    }

    /// Signal the tail to stop and wait for it to exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for WatchdogHandle {
    /// Cancel the background tail task when the handle is dropped.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
