use crate::error::{Error, Result};
use crate::metadata::{ManifestKind, VersionResolver};
use crate::net::{download_to_path, MetadataClient};
use crate::provision::ProgressCallback;
use crate::server::config::{ServerConfig, SERVER_JAR};
use std::sync::Arc;

/// Downloads the official server artifact for a resolved version.
pub struct VanillaProvisioner {
    resolver: Arc<VersionResolver>,
    client: MetadataClient,
}

impl VanillaProvisioner {
    pub fn new(resolver: Arc<VersionResolver>, client: MetadataClient) -> Self {
        Self { resolver, client }
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
            log::debug!("Server artifact already present: {:?}", target);
            return Ok(false);
        }

        let info = self
            .resolver
            .resolve(config.version.as_deref(), ManifestKind::Servers)
            .await
            .map_err(|e| Error::Provisioning(format!("could not resolve version: {}", e)))?;
        config.version = Some(info.id.clone());

        let metadata = self
            .resolver
            .version_metadata(&info)
            .await
            .map_err(|e| Error::Provisioning(format!("metadata for {}: {}", info.id, e)))?;

        let download = metadata.server_download().ok_or_else(|| {
            Error::Provisioning(format!("version {} has no server artifact", info.id))
        })?;

        log::info!("Downloading server {} -> {:?}", info.id, target);
        let progress_target = target.clone();
        download_to_path(
            self.client.http(),
            &download.url,
            &target,
            Some(&download.sha1),
            |transferred, total| on_progress(&progress_target, transferred, total),
        )
        .await
        .map_err(|e| Error::Provisioning(format!("download of {}: {}", info.id, e)))?;

        Ok(true)
    }
}
