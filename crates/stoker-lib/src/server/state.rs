use serde::{Deserialize, Serialize};

/// Lifecycle state of the supervised server process.
///
/// Exactly one value exists per supervisor instance at any time; all
/// transitions go through the supervisor's own transition helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl ServerState {
    /// Whether `start()` is legal from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, ServerState::Stopped | ServerState::Crashed)
    }

    /// Whether commands (`execute`, `stop`) may be written to the process.
    pub fn can_execute(&self) -> bool {
        matches!(self, ServerState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Crashed => "crashed",
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
