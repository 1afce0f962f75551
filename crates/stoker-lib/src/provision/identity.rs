use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Identity facts persisted next to the artifact after provisioning.
pub const IDENTITY_FILE: &str = "version.json";

/// The identity document modern server jars embed as a `version.json` entry.
/// Older distributions carry `name` instead of `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ArtifactIdentity {
    pub fn version_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.name.as_deref())
    }
}

/// Introspect the jar's embedded identity and persist it to
/// `<install_dir>/version.json`. A jar without an identity entry is accepted
/// silently (loader launchers often have none); drift detection then has
/// nothing to go on.
pub async fn persist_artifact_identity(
    install_dir: &Path,
    jar: &Path,
) -> Result<Option<ArtifactIdentity>> {
    let jar_path: PathBuf = jar.to_path_buf();
    let identity = tokio::task::spawn_blocking(move || read_embedded_identity(&jar_path))
        .await
        .map_err(|e| Error::Provisioning(format!("identity introspection panicked: {}", e)))??;

    match &identity {
        Some(identity) => {
            let path = install_dir.join(IDENTITY_FILE);
            let json = serde_json::to_string_pretty(identity)?;
            tokio::fs::write(&path, json).await?;
            log::debug!(
                "Persisted artifact identity {:?} to {:?}",
                identity.version_id(),
                path
            );
        }
        None => {
            log::debug!("Artifact {:?} carries no embedded identity", jar);
        }
    }

    Ok(identity)
}

fn read_embedded_identity(jar: &Path) -> Result<Option<ArtifactIdentity>> {
    let file = std::fs::File::open(jar)?;
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            log::warn!("Artifact {:?} is not a readable jar: {}", jar, e);
            return Ok(None);
        }
    };

    let mut entry = match archive.by_name(IDENTITY_FILE) {
        Ok(entry) => entry,
        Err(_) => return Ok(None),
    };

    let mut contents = String::new();
    entry.read_to_string(&mut contents)?;
    let identity: ArtifactIdentity = serde_json::from_str(&contents)
        .map_err(|e| Error::Provisioning(format!("embedded version.json in {:?}: {}", jar, e)))?;
    Ok(Some(identity))
}

/// Compare the persisted artifact identity against the configured version,
/// without a network call. When no identity was recorded there is nothing to
/// contradict the configuration, so the check passes.
pub async fn validate_version(install_dir: &Path, configured: &str) -> Result<bool> {
    let path = install_dir.join(IDENTITY_FILE);
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };

    let identity: ArtifactIdentity = serde_json::from_str(&contents)?;
    Ok(match identity.version_id() {
        Some(actual) => actual == configured,
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_jar(path: &Path, identity_json: Option<&str>) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        if let Some(json) = identity_json {
            writer
                .start_file(IDENTITY_FILE, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(json.as_bytes()).unwrap();
        } else {
            writer
                .start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn persists_identity_and_detects_drift() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("server.jar");
        write_jar(&jar, Some(r#"{"id": "1.20.1", "name": "1.20.1"}"#));

        let identity = persist_artifact_identity(dir.path(), &jar)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.version_id(), Some("1.20.1"));
        assert!(dir.path().join(IDENTITY_FILE).exists());

        assert!(validate_version(dir.path(), "1.20.1").await.unwrap());
        assert!(!validate_version(dir.path(), "1.21").await.unwrap());
    }

    #[tokio::test]
    async fn jar_without_identity_entry_is_accepted() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("server.jar");
        write_jar(&jar, None);

        let identity = persist_artifact_identity(dir.path(), &jar).await.unwrap();
        assert!(identity.is_none());
        assert!(!dir.path().join(IDENTITY_FILE).exists());
    }

    #[tokio::test]
    async fn missing_identity_file_passes_validation() {
        let dir = tempdir().unwrap();
        assert!(validate_version(dir.path(), "1.20.1").await.unwrap());
    }

    #[tokio::test]
    async fn non_jar_artifact_is_tolerated() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("server.jar");
        tokio::fs::write(&jar, b"definitely not a zip").await.unwrap();

        let identity = persist_artifact_identity(dir.path(), &jar).await.unwrap();
        assert!(identity.is_none());
    }
}
