//! Daemon configuration parsing, validation, and path layout.
//!
//! Everything lives under a single base directory (default `~/.argus`):
//!
//! - `wireproxy/wireproxy` — the managed executable
//! - `wireproxy_confs/*.conf` — tunnel configuration files
//! - `wp-server-logs/` — per-session logs and the audit trail
//!
//! All settings have defaults, so the daemon runs without a config file;
//! a TOML file and CLI flags can override individual values.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{DaemonError, Result};

/// Network watchdog thresholds and intervals.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WatchdogConfig {
    /// Consecutive matching error lines required to trip the watchdog.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Sleep between tail polls when the log has no new lines.
    #[serde(default = "default_watchdog_poll_ms")]
    pub poll_interval_ms: u64,
    /// Delay before the tail opens the log, letting the first lines land.
    #[serde(default = "default_watchdog_startup_ms")]
    pub startup_delay_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            error_threshold: default_error_threshold(),
            poll_interval_ms: default_watchdog_poll_ms(),
            startup_delay_ms: default_watchdog_startup_ms(),
        }
    }
}

fn default_error_threshold() -> u32 {
    5
}

fn default_watchdog_poll_ms() -> u64 {
    100
}

fn default_watchdog_startup_ms() -> u64 {
    500
}

fn default_port() -> u16 {
    23888
}

fn default_startup_probe_ms() -> u64 {
    500
}

fn default_term_grace_ms() -> u64 {
    5000
}

fn default_term_poll_ms() -> u64 {
    100
}

fn default_base_dir() -> PathBuf {
    expand_tilde("~/.argus")
}

/// Global daemon configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DaemonConfig {
    /// Base directory holding the binary, configs, and logs.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Loopback TCP port for the control protocol.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pause after spawn before the liveness probe decides startup worked.
    #[serde(default = "default_startup_probe_ms")]
    pub startup_probe_ms: u64,
    /// How long to wait for graceful termination before force-killing.
    #[serde(default = "default_term_grace_ms")]
    pub term_grace_ms: u64,
    /// Sleep between liveness polls while waiting for termination.
    #[serde(default = "default_term_poll_ms")]
    pub term_poll_ms: u64,
    /// Network watchdog settings.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            port: default_port(),
            startup_probe_ms: default_startup_probe_ms(),
            term_grace_ms: default_term_grace_ms(),
            term_poll_ms: default_term_poll_ms(),
            watchdog: WatchdogConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| DaemonError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Path to the managed executable.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        self.base_dir.join("wireproxy").join("wireproxy")
    }

    /// Directory holding the tunnel configuration files.
    #[must_use]
    pub fn configs_dir(&self) -> PathBuf {
        self.base_dir.join("wireproxy_confs")
    }

    /// Directory holding per-session logs and the audit trail.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("wp-server-logs")
    }

    /// Create the configs and logs directories if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Config` if a directory cannot be created.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.configs_dir(), self.logs_dir()] {
            fs::create_dir_all(&dir).map_err(|err| {
                DaemonError::Config(format!("failed to create {}: {err}", dir.display()))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.watchdog.error_threshold == 0 {
            return Err(DaemonError::Config(
                "watchdog.error_threshold must be greater than zero".into(),
            ));
        }
        if self.watchdog.poll_interval_ms == 0 {
            return Err(DaemonError::Config(
                "watchdog.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.term_poll_ms == 0 {
            return Err(DaemonError::Config(
                "term_poll_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
///
/// When `HOME` is unset the fallback is the system temporary directory, so
/// log storage keeps working in stripped-down environments.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let Some(rest) = path.strip_prefix('~') else {
        return PathBuf::from(path);
    };
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    match env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(rest),
        _ => env::temp_dir().join(rest),
    }
}
