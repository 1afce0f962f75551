pub mod classifier;
pub mod config;
pub mod eula;
pub mod events;
pub mod properties;
pub mod state;
pub mod supervisor;

pub use classifier::{ClassifiedRecord, LogClassifier, Signals};
pub use config::{ServerConfig, SERVER_JAR, SERVER_PROPERTIES};
pub use eula::{accept_eula, EULA_FILE};
pub use events::{LogEntry, ServerEvent, Severity};
pub use properties::{PropertiesStore, PropertyLine};
pub use state::ServerState;
pub use supervisor::ProcessSupervisor;
