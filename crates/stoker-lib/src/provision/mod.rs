pub mod build;
pub mod identity;
pub mod loader;
pub mod vanilla;

pub use build::BuildProvisioner;
pub use identity::{validate_version, ArtifactIdentity, IDENTITY_FILE};
pub use loader::LoaderProvisioner;
pub use vanilla::VanillaProvisioner;

use crate::error::Result;
use crate::server::config::ServerConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Download progress callback: (target path, bytes so far, total if known).
pub type ProgressCallback = Arc<dyn Fn(&Path, u64, Option<u64>) + Send + Sync>;

/// Line callback for child build-tool output.
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_, _, _| {})
}

/// Strategy object that guarantees a runnable server artifact exists at the
/// target path. One variant per acquisition flow; a supervisor owns exactly
/// one for its lifetime. The provisioner holds no process state, only
/// path/version facts.
pub enum Provisioner {
    /// Download the server artifact straight from the resolved version entry.
    Vanilla(VanillaProvisioner),
    /// Run a third-party build tool that produces the artifact locally.
    BuildFromSource(BuildProvisioner),
    /// Download a composed version+loader+installer artifact.
    LoaderBased(LoaderProvisioner),
}

impl Provisioner {
    /// Make sure the artifact exists at `artifact_path`. No-op when the file
    /// is already present and `force` is false. Resolves `config.version` to
    /// the latest release when unset and fills it in. After (re)obtaining the
    /// artifact, its embedded identity is introspected and persisted next to
    /// it so `validate_version` works offline.
    pub async fn ensure_artifact(
        &self,
        config: &mut ServerConfig,
        force: bool,
        on_progress: &ProgressCallback,
    ) -> Result<()> {
        let obtained = match self {
            Provisioner::Vanilla(p) => p.ensure(config, force, on_progress).await?,
            Provisioner::BuildFromSource(p) => p.ensure(config, force, on_progress).await?,
            Provisioner::LoaderBased(p) => p.ensure(config, force, on_progress).await?,
        };

        if obtained {
            let jar = self.artifact_path(config);
            identity::persist_artifact_identity(&config.install_dir, &jar).await?;
        }

        Ok(())
    }

    /// Where this provisioner puts (and expects) the runnable jar.
    pub fn artifact_path(&self, config: &ServerConfig) -> PathBuf {
        match self {
            Provisioner::BuildFromSource(p) => p.artifact_path(config),
            _ => config.install_dir.join(crate::server::config::SERVER_JAR),
        }
    }

    /// Check the on-disk artifact identity against the configured version
    /// without touching the network.
    pub async fn validate_version(&self, config: &ServerConfig) -> Result<bool> {
        match &config.version {
            Some(version) => validate_version(&config.install_dir, version).await,
            None => Ok(true),
        }
    }
}
