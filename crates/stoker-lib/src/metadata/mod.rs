pub mod cache;
pub mod resolver;
pub mod types;

pub use cache::{FactsCache, FACTS_CACHE_FILE};
pub use resolver::{LoaderVersionResolver, VersionResolver, FABRIC_META_URL, MOJANG_MANIFEST_URL};
pub use types::{
    latest_stable, ArtifactFacts, DownloadEntry, LatestVersions, LoaderEntry, LoaderManifest,
    ManifestKind, VersionInfo, VersionKind, VersionManifest, VersionMetadata,
};
