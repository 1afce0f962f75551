pub mod error;
pub mod metadata;
pub mod net;
pub mod provision;
pub mod server;

// Re-export commonly used types
pub use error::{Error, Result};
pub use metadata::{
    ArtifactFacts, FactsCache, LoaderVersionResolver, ManifestKind, VersionInfo, VersionKind,
    VersionManifest, VersionResolver,
};
pub use net::MetadataClient;
pub use provision::{
    BuildProvisioner, LoaderProvisioner, Provisioner, VanillaProvisioner,
};
pub use server::{
    accept_eula, LogClassifier, LogEntry, ProcessSupervisor, PropertiesStore, ServerConfig,
    ServerEvent, ServerState, Severity,
};
