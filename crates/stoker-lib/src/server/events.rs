use crate::server::state::ServerState;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Severity of a single log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One classified log record from the server process (or internal supervisor
/// commentary). Delivery order is FIFO per process lifetime.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: Severity,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outward event stream of the supervisor.
///
/// Events are pushed over an unbounded mpsc channel taken from the supervisor
/// at construction time; ordering is FIFO per source.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Emitted on every state transition.
    StateUpdate(ServerState),

    /// Emitted for every classified output line and internal log statement.
    Message(LogEntry),

    /// Emitted exactly once per EULA-required detection. The process exits on
    /// its own afterwards; accept the EULA and call `start()` again.
    Eula,

    /// Download progress forwarded from the provisioner.
    Download {
        path: PathBuf,
        transferred: u64,
        total: Option<u64>,
    },
}
