use crate::error::{Error, Result};
use crate::metadata::LoaderVersionResolver;
use crate::net::{download_to_path, MetadataClient};
use crate::provision::ProgressCallback;
use crate::server::config::{ServerConfig, SERVER_JAR};
use std::sync::Arc;

/// Downloads a loader-distribution server launcher composed from a game
/// version, loader version and installer version.
pub struct LoaderProvisioner {
    resolver: Arc<LoaderVersionResolver>,
    client: MetadataClient,
    loader_version: Option<String>,
    installer_version: Option<String>,
}

impl LoaderProvisioner {
    pub fn new(resolver: Arc<LoaderVersionResolver>, client: MetadataClient) -> Self {
        Self {
            resolver,
            client,
            loader_version: None,
            installer_version: None,
        }
    }

    /// Pin the loader and/or installer versions instead of taking the latest
    /// stable ones.
    pub fn with_versions(
        mut self,
        loader_version: Option<String>,
        installer_version: Option<String>,
    ) -> Self {
        self.loader_version = loader_version;
        self.installer_version = installer_version;
        self
    }

    /// Returns whether the artifact was (re)downloaded.
    pub(crate) async fn ensure(
        &self,
        config: &mut ServerConfig,
        force: bool,
        on_progress: &ProgressCallback,
    ) -> Result<bool> {
        let target = config.install_dir.join(SERVER_JAR);
        if target.exists() && !force {
            log::debug!("Loader artifact already present: {:?}", target);
            return Ok(false);
        }

        let game = match &config.version {
            Some(version) => version.clone(),
            None => self.resolver.latest_stable_game().await?,
        };
        let loader = match &self.loader_version {
            Some(version) => version.clone(),
            None => self.resolver.latest_stable_loader().await?,
        };
        let installer = match &self.installer_version {
            Some(version) => version.clone(),
            None => self.resolver.latest_stable_installer().await?,
        };

        // "Latest stable" legitimately comes back empty; it only becomes an
        // error once an artifact actually has to be composed from it.
        for (what, value) in [("game", &game), ("loader", &loader), ("installer", &installer)] {
            if value.is_empty() {
                return Err(Error::Provisioning(format!(
                    "no stable {} version available from {}",
                    what,
                    self.resolver.meta_url()
                )));
            }
        }
        config.version = Some(game.clone());

        let url = format!(
            "{}/loader/{}/{}/{}/server/jar",
            self.resolver.meta_url(),
            game,
            loader,
            installer
        );
        log::info!(
            "Downloading loader server {} (loader {}, installer {}) -> {:?}",
            game,
            loader,
            installer,
            target
        );

        let progress_target = target.clone();
        download_to_path(
            self.client.http(),
            &url,
            &target,
            None,
            |transferred, total| on_progress(&progress_target, transferred, total),
        )
        .await
        .map_err(|e| Error::Provisioning(format!("loader download of {}: {}", game, e)))?;

        Ok(true)
    }
}
