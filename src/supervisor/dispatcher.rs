//! Command parsing, validation, and serialized execution.
//!
//! A single mutex serializes all command execution, so at most one command
//! is in flight at any time and lifecycle state is observable only at
//! command boundaries. The protocol is low-rate and commands are short, so
//! holding the mutex across the startup probe and termination wait is an
//! accepted trade-off for the simplicity of mutual exclusion.
//!
//! Request grammar: `CMD:ARG1,ARG2,...\n` — the colon is mandatory even
//! without arguments. Every reply is a single JSON object with the keys
//! `CMD`, `result`, and `error`, all always present.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditSink};
use crate::binary::BinaryLocator;
use crate::config::DaemonConfig;
use crate::confs::ConfStore;
use crate::supervisor::child::ChildProcess;
use crate::supervisor::session_log::SessionLog;
use crate::supervisor::state_machine::{LifecycleState, StateMachine};
use crate::supervisor::watchdog::NetworkWatchdog;
use crate::{DaemonError, Result};

/// Structured reply for one command.
///
/// `result` and `error` are mutually exclusive; both keys are always
/// serialized, as clients key on their presence.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    /// Echoed command name, or `unknown` for unparseable lines.
    #[serde(rename = "CMD")]
    pub cmd: String,
    /// Command result object on success, null on error.
    pub result: Option<Value>,
    /// Human-readable message on failure, null on success.
    pub error: Option<String>,
}

impl Reply {
    pub(crate) fn ok(cmd: &str, result: Value) -> Self {
        Self {
            cmd: cmd.to_owned(),
            result: Some(result),
            error: None,
        }
    }

    pub(crate) fn err(cmd: &str, message: impl Into<String>) -> Self {
        Self {
            cmd: cmd.to_owned(),
            result: None,
            error: Some(message.into()),
        }
    }

    /// Serialize to a single wire line (without the trailing newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"CMD":"unknown","result":null,"error":"reply serialization failed"}"#.to_owned()
        })
    }
}

/// State bundle for one child lifetime.
struct Session {
    config_name: String,
    started_at: DateTime<Utc>,
    child: ChildProcess,
}

/// Parses command lines and executes them against the lifecycle state.
///
/// Only the dispatcher installs or drops the session; the watchdog holds
/// just enough of a back-reference (pid, log path, flags) to signal the
/// process group, never ownership.
pub struct Dispatcher {
    config: Arc<DaemonConfig>,
    state: StateMachine,
    confs: ConfStore,
    binary: BinaryLocator,
    log: SessionLog,
    audit: Option<Arc<dyn AuditSink>>,
    session: Mutex<Option<Session>>,
}

impl Dispatcher {
    /// Construct a dispatcher over the directory layout in `config`.
    #[must_use]
    pub fn new(config: Arc<DaemonConfig>, audit: Option<Arc<dyn AuditSink>>) -> Self {
        let confs = ConfStore::new(config.configs_dir());
        let binary = BinaryLocator::new(config.binary_path());
        let log = SessionLog::new(config.logs_dir(), config.configs_dir());
        Self {
            config,
            state: StateMachine::new(),
            confs,
            binary,
            log,
            audit,
            session: Mutex::new(None),
        }
    }

    /// Current lifecycle state, read without blocking.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.state.state()
    }

    /// Parse and execute one command line, producing a structured reply.
    ///
    /// Serialized: concurrent callers queue on an internal mutex and
    /// observe each other's effects only at command boundaries. All errors
    /// become structured replies; nothing propagates past this point.
    pub async fn execute(&self, raw: &str) -> Reply {
        let mut session = self.session.lock().await;

        self.audit_record(AuditCategory::Cmd, raw.trim_end_matches(['\r', '\n']));
        let reply = match parse_line(raw) {
            Err(err) => Reply::err("unknown", err.to_string()),
            Ok((cmd, args)) => match self.run_command(&mut session, cmd, &args).await {
                Ok(value) => Reply::ok(cmd, value),
                Err(err) => Reply::err(cmd, err.to_string()),
            },
        };
        match &reply.error {
            Some(err) => self.audit_record(AuditCategory::Error, &format!("{}: {err}", reply.cmd)),
            None => self.audit_record(AuditCategory::Success, &reply.cmd),
        }

        reply
    }

    /// Terminate any live session and finalize its log.
    ///
    /// Invoked on supervisor shutdown; uses the same escalation as
    /// `spin_down`. Safe to call more than once — after the first call the
    /// session is gone and the rest is a no-op.
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        let Some(mut active) = session.take() else {
            return;
        };

        info!(config = %active.config_name, "terminating live session on shutdown");
        if self.state.state() == LifecycleState::Running {
            let _ = self.state.transition_to(LifecycleState::Stopping);
        }

        let method = active.child.terminate().await;
        self.log.finalize(&method);
        let _ = self.state.transition_to(LifecycleState::Idle);
        self.audit_record(
            AuditCategory::Action,
            &format!("Session terminated on shutdown: {method}"),
        );
    }

    async fn run_command(
        &self,
        session: &mut Option<Session>,
        cmd: &str,
        args: &[&str],
    ) -> Result<Value> {
        match cmd {
            "spin_up" => {
                let name = args.first().ok_or_else(|| {
                    DaemonError::MissingArgument(
                        "Not enough args: spin_up requires config name".into(),
                    )
                })?;
                self.handle_spin_up(session, name).await
            }
            "spin_down" => self.handle_spin_down(session).await,
            "state" => self.handle_state(session).await,
            "available_confs" => self.handle_available_confs(),
            "whoami" => Ok(Self::handle_whoami()),
            other => Err(DaemonError::UnknownCommand(format!(
                "Unknown command: {other}"
            ))),
        }
    }

    async fn handle_spin_up(
        &self,
        session: &mut Option<Session>,
        config_name: &str,
    ) -> Result<Value> {
        if self.state.state() != LifecycleState::Idle {
            let mut msg = "WireProxy is already running".to_owned();
            if let Some(active) = session.as_ref() {
                msg.push_str(" with config: ");
                msg.push_str(&active.config_name);
            }
            return Err(DaemonError::AlreadyRunning(msg));
        }

        let normalized = ConfStore::normalize_name(config_name);
        if !self.confs.exists(&normalized) {
            return Err(DaemonError::ConfigNotFound(format!(
                "Configuration not found: {normalized}"
            )));
        }

        if !self.state.transition_to(LifecycleState::Starting) {
            return Err(DaemonError::Transition(
                "Failed to transition to STARTING state".into(),
            ));
        }
        self.audit_transition(LifecycleState::Idle, LifecycleState::Starting);

        let version = self.binary.version().await;

        let log_path = match self.log.create(&normalized, &version) {
            Ok(path) => path,
            Err(err) => {
                self.abort_startup(session, None);
                return Err(err);
            }
        };

        let log_handle = match self.log.handle() {
            Ok(handle) => handle,
            Err(err) => {
                self.abort_startup(session, Some("Error during startup"));
                return Err(err);
            }
        };

        let mut child = ChildProcess::new(
            self.binary.path().to_path_buf(),
            Duration::from_millis(self.config.term_grace_ms),
            Duration::from_millis(self.config.term_poll_ms),
        );
        let config_path = self.confs.path_of(&normalized);
        if let Err(err) = child.spawn(&config_path, log_handle) {
            warn!(%err, config = %normalized, "tunnel spawn failed");
            self.abort_startup(session, Some("Spawn failed"));
            return Err(DaemonError::Spawn("Failed to spawn WireProxy process".into()));
        }

        // Give the child a moment to parse its config and settle before the
        // probe decides whether startup worked.
        tokio::time::sleep(Duration::from_millis(self.config.startup_probe_ms)).await;

        if !child.is_alive() {
            let failed_log = self.log.current_path();
            self.abort_startup(session, Some("Process died during startup"));
            return Err(DaemonError::StartupFailed(format!(
                "WireProxy failed to start. Check log: {}",
                failed_log.display()
            )));
        }

        let watchdog = NetworkWatchdog::new(
            log_path.clone(),
            child.pid(),
            self.config.watchdog.error_threshold,
            Duration::from_millis(self.config.watchdog.poll_interval_ms),
            Duration::from_millis(self.config.watchdog.startup_delay_ms),
        )
        .spawn();
        child.attach_watchdog(watchdog);

        let pid = child.pid();
        *session = Some(Session {
            config_name: normalized.clone(),
            started_at: Utc::now(),
            child,
        });

        if !self.state.transition_to(LifecycleState::Running) {
            warn!("lifecycle refused Starting -> Running");
        }
        self.audit_transition(LifecycleState::Starting, LifecycleState::Running);
        info!(pid, config = %normalized, "tunnel session started");

        Ok(json!({
            "status": "running",
            "config": normalized,
            "pid": pid,
            "log_file": log_path.display().to_string(),
        }))
    }

    async fn handle_spin_down(&self, session: &mut Option<Session>) -> Result<Value> {
        if self.state.state() != LifecycleState::Running || session.is_none() {
            return Err(DaemonError::NotRunning("WireProxy is not running".into()));
        }

        if !self.state.transition_to(LifecycleState::Stopping) {
            return Err(DaemonError::Transition(
                "Failed to transition to STOPPING state".into(),
            ));
        }
        self.audit_transition(LifecycleState::Running, LifecycleState::Stopping);

        let Some(mut active) = session.take() else {
            // Unreachable given the check above; fail safe back to idle.
            let _ = self.state.transition_to(LifecycleState::Idle);
            return Err(DaemonError::NotRunning("WireProxy is not running".into()));
        };

        let prev_config = active.config_name.clone();
        let log_path = self.log.current_path();

        let method = active.child.terminate().await;
        self.log.finalize(&method);
        let _ = self.state.transition_to(LifecycleState::Idle);
        self.audit_transition(LifecycleState::Stopping, LifecycleState::Idle);

        let uptime_secs = Utc::now()
            .signed_duration_since(active.started_at)
            .num_seconds();
        info!(config = %prev_config, uptime_secs, method, "tunnel session stopped");

        Ok(json!({
            "status": "stopped",
            "previous_config": prev_config,
            "log_file": log_path.display().to_string(),
        }))
    }

    async fn handle_state(&self, session: &mut Option<Session>) -> Result<Value> {
        self.reap_if_dead(session).await;

        if self.state.state() == LifecycleState::Running {
            if let Some(active) = session.as_ref() {
                return Ok(json!({
                    "running": true,
                    "config": active.config_name,
                    "pid": active.child.pid(),
                    "log_file": self.log.current_path().display().to_string(),
                }));
            }
        }

        let last_log = self.log.current_path();
        let log_value = if last_log.as_os_str().is_empty() {
            Value::Null
        } else {
            Value::String(last_log.display().to_string())
        };
        Ok(json!({
            "running": false,
            "config": null,
            "pid": null,
            "log_file": log_value,
        }))
    }

    fn handle_available_confs(&self) -> Result<Value> {
        let configs = self.confs.list()?;
        Ok(json!({
            "count": configs.len(),
            "configs": configs,
        }))
    }

    fn handle_whoami() -> Value {
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "implementation": "Rust",
        })
    }

    /// Lazy cleanup: if the child died while nominally running, reap it,
    /// finalize the log with the appropriate reason, and return to idle.
    async fn reap_if_dead(&self, session: &mut Option<Session>) {
        if self.state.state() != LifecycleState::Running {
            return;
        }

        let reason = {
            let Some(active) = session.as_mut() else {
                return;
            };
            if active.child.is_alive() {
                return;
            }
            if active.child.has_network_drop() {
                "Network drop detected - auto-terminated"
            } else {
                "Process died unexpectedly"
            }
        };

        let Some(mut active) = session.take() else {
            return;
        };
        active.child.stop_watchdog().await;
        self.log.finalize(reason);
        let _ = self.state.transition_to(LifecycleState::Idle);
        self.audit_transition(LifecycleState::Running, LifecycleState::Idle);
        self.audit_record(AuditCategory::Action, reason);
        info!(config = %active.config_name, reason, "tunnel process exited");
    }

    /// Fail-safe unwind for `spin_up` errors: finalize a possibly-open log,
    /// drop any session, and revert to idle before replying.
    fn abort_startup(&self, session: &mut Option<Session>, finalize_reason: Option<&str>) {
        if let Some(reason) = finalize_reason {
            self.log.finalize(reason);
        }
        *session = None;
        let _ = self.state.transition_to(LifecycleState::Idle);
        self.audit_transition(LifecycleState::Starting, LifecycleState::Idle);
    }

    fn audit_record(&self, category: AuditCategory, message: &str) {
        if let Some(audit) = self.audit.as_ref() {
            if let Err(err) = audit.record(category, message) {
                warn!(%err, "audit write failed");
            }
        }
    }

    fn audit_transition(&self, from: LifecycleState, to: LifecycleState) {
        self.audit_record(AuditCategory::State, &format!("{from:?} -> {to:?}"));
    }
}

/// Split a raw line into the command name and its trimmed, non-empty
/// arguments. The trailing newline belongs to the framing, not the last
/// argument.
fn parse_line(raw: &str) -> Result<(&str, Vec<&str>)> {
    let colon = raw
        .find(':')
        .ok_or_else(|| DaemonError::Parse("Parsing error: colon not found".into()))?;

    let cmd = &raw[..colon];
    let args = raw[colon + 1..]
        .trim_end_matches('\n')
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .collect();
    Ok((cmd, args))
}
