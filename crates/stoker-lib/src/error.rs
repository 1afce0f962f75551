use crate::server::state::ServerState;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for supervisor, resolver and provisioning operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was attempted in a state that forbids it. Recoverable by
    /// waiting for (or forcing) a legal state.
    #[error("operation `{operation}` is not legal while the server is {state}")]
    IllegalState {
        operation: &'static str,
        state: ServerState,
    },

    /// The server artifact could not be obtained. Fatal to the current
    /// start() attempt; the supervisor transitions to Crashed.
    #[error("provisioning failed: {0}")]
    Provisioning(String),

    /// The server process failed to launch.
    #[error("failed to spawn server process: {0}")]
    Spawn(#[source] std::io::Error),

    /// An upstream manifest fetch returned a non-success status or a payload
    /// that did not parse. Surfaced to the caller, never auto-retried.
    #[error("metadata request failed: {0}")]
    Metadata(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
