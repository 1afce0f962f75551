use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Catalog of available game versions (version_manifest_v2.json shape).
/// Fetched at most once per resolver instance and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// One catalog entry pointing at the per-version metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: VersionKind,

    /// URL of the per-version metadata JSON.
    #[serde(rename = "url")]
    pub metadata_url: String,

    pub sha1: String,

    #[serde(rename = "releaseTime")]
    pub release_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionKind {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
}

/// Which filtered view of the manifest a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// The unfiltered base manifest.
    All,
    /// Versions with a downloadable server artifact.
    Servers,
    /// Versions with published server mappings.
    WithServerMappings,
    /// Versions with published client mappings.
    WithClientMappings,
}

/// Downloadable-artifact capability flags for one version id. Cached on disk
/// and never refreshed: upstream metadata for a released id does not change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFacts {
    pub has_server_artifact: bool,
    pub has_server_mappings: bool,
    pub has_client_mappings: bool,
}

impl ArtifactFacts {
    pub fn matches(&self, kind: ManifestKind) -> bool {
        match kind {
            ManifestKind::All => true,
            ManifestKind::Servers => self.has_server_artifact,
            ManifestKind::WithServerMappings => self.has_server_mappings,
            ManifestKind::WithClientMappings => self.has_client_mappings,
        }
    }
}

/// Per-version metadata document, reduced to the download table the resolver
/// and provisioners care about.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionMetadata {
    #[serde(default)]
    pub downloads: HashMap<String, DownloadEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadEntry {
    pub url: String,
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
}

impl VersionMetadata {
    pub fn facts(&self) -> ArtifactFacts {
        ArtifactFacts {
            has_server_artifact: self.downloads.contains_key("server"),
            has_server_mappings: self.downloads.contains_key("server_mappings"),
            has_client_mappings: self.downloads.contains_key("client_mappings"),
        }
    }

    pub fn server_download(&self) -> Option<&DownloadEntry> {
        self.downloads.get("server")
    }
}

/// Loader-metadata manifest for alternate (Fabric-shaped) distributions.
/// Independent of the Mojang manifest; every list carries `stable` flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderManifest {
    #[serde(default)]
    pub game: Vec<LoaderEntry>,
    #[serde(default)]
    pub intermediary: Vec<LoaderEntry>,
    #[serde(default)]
    pub loader: Vec<LoaderEntry>,
    #[serde(default)]
    pub installer: Vec<LoaderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderEntry {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

/// First stable entry's version, or the empty string when none exists.
/// Callers must handle the empty case; it is not an error.
pub fn latest_stable(entries: &[LoaderEntry]) -> String {
    entries
        .iter()
        .find(|e| e.stable)
        .map(|e| e.version.clone())
        .unwrap_or_default()
}
