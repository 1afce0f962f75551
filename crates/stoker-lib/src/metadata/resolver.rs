use crate::error::{Error, Result};
use crate::metadata::cache::FactsCache;
use crate::metadata::types::{
    latest_stable, ArtifactFacts, LatestVersions, LoaderManifest, ManifestKind, VersionInfo,
    VersionKind, VersionManifest, VersionMetadata,
};
use crate::net::MetadataClient;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const MOJANG_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

pub const FABRIC_META_URL: &str = "https://meta.fabricmc.net/v2/versions";

/// Resolves user-supplied version strings against the upstream manifest.
///
/// The base manifest is fetched at most once per resolver instance: the first
/// caller triggers the request and concurrent callers await the same pending
/// result through the `OnceCell`. Per-version artifact facts are fetched in
/// bulk for ids missing from the injected cache and persisted there.
#[derive(Debug)]
pub struct VersionResolver {
    client: MetadataClient,
    manifest_url: String,
    facts: Arc<FactsCache>,
    base: OnceCell<VersionManifest>,
}

impl VersionResolver {
    pub fn new(client: MetadataClient, facts: Arc<FactsCache>) -> Self {
        Self::with_manifest_url(client, MOJANG_MANIFEST_URL, facts)
    }

    /// Point the resolver at a different manifest endpoint (tests, mirrors).
    pub fn with_manifest_url(
        client: MetadataClient,
        manifest_url: impl Into<String>,
        facts: Arc<FactsCache>,
    ) -> Self {
        Self {
            client,
            manifest_url: manifest_url.into(),
            facts,
            base: OnceCell::new(),
        }
    }

    /// The memoized base manifest. At most one fetch is ever in flight.
    async fn base_manifest(&self) -> Result<&VersionManifest> {
        self.base
            .get_or_try_init(|| async {
                log::info!("Fetching version manifest from {}", self.manifest_url);
                let manifest: VersionManifest = self.client.get_json(&self.manifest_url).await?;
                log::info!("Fetched {} versions", manifest.versions.len());
                Ok(manifest)
            })
            .await
    }

    /// A filtered view over the base manifest. `latest` is recomputed for the
    /// view: the first entry of each kind that the filter keeps.
    pub async fn manifest(&self, kind: ManifestKind) -> Result<VersionManifest> {
        let base = self.base_manifest().await?;
        if kind == ManifestKind::All {
            return Ok(base.clone());
        }

        let facts = self.ensure_facts(&base.versions).await?;
        let versions: Vec<VersionInfo> = base
            .versions
            .iter()
            .filter(|v| {
                facts
                    .get(&v.id)
                    .map(|f| f.matches(kind))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let latest = LatestVersions {
            release: first_of_kind(&versions, VersionKind::Release),
            snapshot: first_of_kind(&versions, VersionKind::Snapshot),
        };

        Ok(VersionManifest { latest, versions })
    }

    /// Resolve a version id (or the latest release of the given view when
    /// absent) to its manifest entry.
    pub async fn resolve(
        &self,
        version_id: Option<&str>,
        kind: ManifestKind,
    ) -> Result<VersionInfo> {
        let manifest = self.manifest(kind).await?;

        let wanted = match version_id {
            Some(id) => id.to_string(),
            None => {
                let latest = manifest.latest.release.clone();
                if latest.is_empty() {
                    return Err(Error::Metadata(
                        "manifest has no release matching the requested view".to_string(),
                    ));
                }
                latest
            }
        };

        manifest
            .versions
            .into_iter()
            .find(|v| v.id == wanted)
            .ok_or_else(|| {
                Error::Metadata(format!(
                    "version {} not found in the requested manifest view",
                    wanted
                ))
            })
    }

    /// Fetch the per-version metadata document for a manifest entry.
    pub async fn version_metadata(&self, info: &VersionInfo) -> Result<VersionMetadata> {
        self.client.get_json(&info.metadata_url).await
    }

    /// Facts for every given version, fetching the missing ones in bulk and
    /// persisting them. A version whose metadata fetch fails is logged and
    /// left out of the view rather than failing the whole batch.
    async fn ensure_facts(
        &self,
        versions: &[VersionInfo],
    ) -> Result<HashMap<String, ArtifactFacts>> {
        let missing = self
            .facts
            .missing(versions.iter().map(|v| v.id.as_str()))
            .await?;

        if !missing.is_empty() {
            log::info!(
                "Fetching artifact facts for {} uncached versions",
                missing.len()
            );

            let futures: Vec<_> = versions
                .iter()
                .filter(|v| missing.contains(&v.id))
                .map(|v| async move {
                    match self
                        .client
                        .get_json::<VersionMetadata>(&v.metadata_url)
                        .await
                    {
                        Ok(meta) => Some((v.id.clone(), meta.facts())),
                        Err(e) => {
                            log::warn!("Failed to fetch metadata for {}: {}", v.id, e);
                            None
                        }
                    }
                })
                .collect();

            let fresh: HashMap<String, ArtifactFacts> =
                join_all(futures).await.into_iter().flatten().collect();
            self.facts.merge(fresh).await?;
        }

        self.facts.entries().await
    }
}

fn first_of_kind(versions: &[VersionInfo], kind: VersionKind) -> String {
    versions
        .iter()
        .find(|v| v.kind == kind)
        .map(|v| v.id.clone())
        .unwrap_or_default()
}

/// Resolver for alternate (loader-based) distributions. The manifest shape is
/// independent of the Mojang one: version lists with `stable` flags where
/// "latest" means the first stable entry, or the empty string when none is.
#[derive(Debug)]
pub struct LoaderVersionResolver {
    client: MetadataClient,
    meta_url: String,
    base: OnceCell<LoaderManifest>,
}

impl LoaderVersionResolver {
    pub fn new(client: MetadataClient) -> Self {
        Self::with_meta_url(client, FABRIC_META_URL)
    }

    pub fn with_meta_url(client: MetadataClient, meta_url: impl Into<String>) -> Self {
        Self {
            client,
            meta_url: meta_url.into(),
            base: OnceCell::new(),
        }
    }

    pub fn meta_url(&self) -> &str {
        &self.meta_url
    }

    /// The memoized loader manifest; same at-most-one-fetch guarantee as the
    /// base resolver.
    pub async fn manifest(&self) -> Result<&LoaderManifest> {
        self.base
            .get_or_try_init(|| async {
                log::info!("Fetching loader manifest from {}", self.meta_url);
                self.client.get_json(&self.meta_url).await
            })
            .await
    }

    /// Latest stable game version, or "" when none is stable.
    pub async fn latest_stable_game(&self) -> Result<String> {
        Ok(latest_stable(&self.manifest().await?.game))
    }

    /// Latest stable loader version, or "" when none is stable.
    pub async fn latest_stable_loader(&self) -> Result<String> {
        Ok(latest_stable(&self.manifest().await?.loader))
    }

    /// Latest stable installer version, or "" when none is stable.
    pub async fn latest_stable_installer(&self) -> Result<String> {
        Ok(latest_stable(&self.manifest().await?.installer))
    }

    pub async fn supports_game(&self, version_id: &str) -> Result<bool> {
        Ok(self
            .manifest()
            .await?
            .game
            .iter()
            .any(|e| e.version == version_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_of_kind_picks_first_matching_entry() {
        let versions = vec![
            VersionInfo {
                id: "24w33a".into(),
                kind: VersionKind::Snapshot,
                metadata_url: "u".into(),
                sha1: "s".into(),
                release_time: chrono::Utc::now(),
            },
            VersionInfo {
                id: "1.21.1".into(),
                kind: VersionKind::Release,
                metadata_url: "u".into(),
                sha1: "s".into(),
                release_time: chrono::Utc::now(),
            },
            VersionInfo {
                id: "1.21".into(),
                kind: VersionKind::Release,
                metadata_url: "u".into(),
                sha1: "s".into(),
                release_time: chrono::Utc::now(),
            },
        ];

        assert_eq!(first_of_kind(&versions, VersionKind::Release), "1.21.1");
        assert_eq!(first_of_kind(&versions, VersionKind::Snapshot), "24w33a");
        assert_eq!(first_of_kind(&versions, VersionKind::OldBeta), "");
    }
}
