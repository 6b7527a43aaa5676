//! Passive audit trail for control-protocol activity.
//!
//! Provides the [`AuditSink`] trait and the file-backed implementation,
//! [`FileAuditLog`]. The dispatcher records received commands, lifecycle
//! transitions, and outcomes; audit failures never fail a command.

pub mod writer;

use std::fmt::{Display, Formatter};

/// Category tag prepended to each audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    /// A command line was received.
    Cmd,
    /// A lifecycle state transition was taken.
    State,
    /// A notable supervisor action (spawn, terminate, watchdog trip).
    Action,
    /// A command failed.
    Error,
    /// A command completed successfully.
    Success,
    /// General informational event.
    Info,
}

impl Display for AuditCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Cmd => "[CMD]",
            Self::State => "[STATE]",
            Self::Action => "[ACTION]",
            Self::Error => "[ERROR]",
            Self::Success => "[SUCCESS]",
            Self::Info => "[INFO]",
        };
        f.write_str(tag)
    }
}

/// Records audit events to a persistent store.
///
/// Implementations must be [`Send`] and [`Sync`] so the sink can be shared
/// across task boundaries via [`std::sync::Arc`].
pub trait AuditSink: Send + Sync {
    /// Record a single audit event.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write operation fails.
    fn record(&self, category: AuditCategory, message: &str) -> crate::Result<()>;
}

pub use writer::FileAuditLog;
