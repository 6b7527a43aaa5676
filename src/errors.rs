//! Error types shared across the daemon.

use std::fmt::{Display, Formatter};

/// Shared daemon result type.
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Daemon error enumeration covering all domain failure modes.
///
/// Variants that surface in protocol replies carry the complete
/// human-readable message as their payload; [`Display`] emits it verbatim
/// so the wire text stays stable across refactors.
#[derive(Debug)]
pub enum DaemonError {
    /// Configuration parsing, validation, or bootstrap failure.
    Config(String),
    /// Malformed command line.
    Parse(String),
    /// Syntactically valid command that is not recognized.
    UnknownCommand(String),
    /// Recognized command missing a required argument.
    MissingArgument(String),
    /// A tunnel process is already being managed.
    AlreadyRunning(String),
    /// No tunnel process is being managed.
    NotRunning(String),
    /// Configuration name does not resolve to a file.
    ConfigNotFound(String),
    /// Attempted lifecycle move violates the transition table.
    Transition(String),
    /// Process spawn or descriptor redirection failed.
    Spawn(String),
    /// Spawn succeeded but the child died during the startup probe.
    StartupFailed(String),
    /// Session log file could not be created or duplicated.
    LogIo(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Unexpected failure inside a command handler.
    Internal(String),
}

impl Display for DaemonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Parse(msg)
            | Self::UnknownCommand(msg)
            | Self::MissingArgument(msg)
            | Self::AlreadyRunning(msg)
            | Self::NotRunning(msg)
            | Self::ConfigNotFound(msg)
            | Self::Transition(msg)
            | Self::Spawn(msg)
            | Self::StartupFailed(msg)
            | Self::LogIo(msg)
            | Self::Internal(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DaemonError {}

impl From<toml::de::Error> for DaemonError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
