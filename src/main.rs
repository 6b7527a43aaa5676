#![forbid(unsafe_code)]

//! `wpdaemon` — WireProxy supervisor daemon binary.
//!
//! Bootstraps configuration, binds the loopback control port, and serves
//! the line-oriented command protocol until SIGINT or SIGTERM. Any live
//! tunnel session is terminated and its log finalized before exit.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use wpdaemon::audit::{AuditSink, FileAuditLog};
use wpdaemon::binary::BinaryLocator;
use wpdaemon::config::expand_tilde;
use wpdaemon::supervisor::dispatcher::Dispatcher;
use wpdaemon::{tcp, DaemonConfig, DaemonError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "wpdaemon", about = "WireProxy supervisor daemon", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    ///
    /// All settings have defaults, so the daemon runs without one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the control port.
    #[arg(long, short)]
    port: Option<u16>,

    /// Override the base directory (default `~/.argus`).
    #[arg(long)]
    base_dir: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("wpdaemon bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| DaemonError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(ref path) => DaemonConfig::load_from_path(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(ref base) = args.base_dir {
        config.base_dir = expand_tilde(base);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.ensure_layout()?;
    let config = Arc::new(config);
    info!(base_dir = %config.base_dir.display(), port = config.port, "configuration loaded");

    // ── Verify the managed binary is available ──────────
    let binary = BinaryLocator::new(config.binary_path());
    if !binary.exists() {
        return Err(DaemonError::Config(format!(
            "wireproxy binary not found at {} — install it before starting the daemon",
            binary.path().display()
        )));
    }
    info!(version = %binary.version().await, "managed binary available");

    // ── Audit trail (best effort) ───────────────────────
    let audit: Option<Arc<dyn AuditSink>> = match FileAuditLog::new(config.logs_dir()) {
        Ok(writer) => Some(Arc::new(writer)),
        Err(err) => {
            warn!(%err, "audit log unavailable; continuing without it");
            None
        }
    };

    // ── Bind the control port and serve ─────────────────
    let listener = tcp::server::bind(config.port)?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&config), audit));

    let cancel = CancellationToken::new();
    let server = tcp::server::spawn_server(listener, Arc::clone(&dispatcher), cancel.clone());
    info!(port = config.port, "wpdaemon ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received — starting graceful shutdown");
    cancel.cancel();

    // A second signal force-exits in case teardown wedges.
    tokio::spawn(async {
        shutdown_signal().await;
        error!("second shutdown signal received — forcing exit");
        std::process::exit(1);
    });

    dispatcher.shutdown().await;
    let _ = server.await;

    info!("wpdaemon shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| DaemonError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| DaemonError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
