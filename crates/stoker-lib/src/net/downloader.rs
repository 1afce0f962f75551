use crate::error::{Error, Result};
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;

/// Download a URL to a path with progress reporting and optional SHA1
/// validation.
///
/// The body streams into a `.part` sibling first and is renamed into place
/// only after validation, so a failed download never leaves a partial file at
/// the destination. Concurrent writers for the same path converge on
/// byte-identical content, so last-writer-wins is safe.
///
/// An existing file whose hash matches (or that exists when no hash was
/// given) is left alone. No retry: network failures surface immediately.
pub async fn download_to_path(
    client: &Client,
    url: &str,
    path: &Path,
    expected_sha1: Option<&str>,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<()> {
    log::debug!("Downloading: {} -> {:?}", url, path);

    if path.exists() {
        match expected_sha1 {
            Some(expected) => {
                let bytes = tokio::fs::read(path).await?;
                let mut hasher = Sha1::new();
                hasher.update(&bytes);
                let computed = format!("{:x}", hasher.finalize());
                if computed.eq_ignore_ascii_case(expected) {
                    log::debug!("File exists and hash matches, skipping: {:?}", path);
                    return Ok(());
                }
                log::info!(
                    "File exists but hash mismatches ({} != {}), re-downloading: {:?}",
                    computed,
                    expected,
                    path
                );
            }
            None => {
                log::debug!("File exists and no hash provided, skipping: {:?}", path);
                return Ok(());
            }
        }
    }

    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Metadata(format!("HTTP {} from {}", status, url)));
    }

    let total_size = response.content_length();
    log::debug!("Download size: {:?} bytes", total_size);

    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    let tmp_path = path.with_file_name(tmp_name);
    let mut file = File::create(&tmp_path).await?;
    let mut downloaded: u64 = 0;
    let mut hasher = Sha1::new();

    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);

        downloaded += chunk.len() as u64;
        on_progress(downloaded, total_size);
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(expected) = expected_sha1 {
        let computed = format!("{:x}", hasher.finalize());
        if !computed.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::Metadata(format!(
                "SHA1 mismatch for {}: expected {}, got {}",
                url, expected, computed
            )));
        }
        log::debug!("SHA1 validated: {}", computed);
    }

    tokio::fs::rename(&tmp_path, path).await?;
    log::debug!("Download complete: {:?} ({} bytes)", path, downloaded);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // SHA1 of the ASCII string "jar-bytes"
    const JAR_BYTES_SHA1: &str = "04e2ebe8b7b182c63c2834f4984aae2901150df1";

    #[tokio::test]
    async fn downloads_validates_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/server.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let target = dir.path().join("server.jar");
        let mut seen = 0u64;
        download_to_path(
            &Client::new(),
            &format!("{}/server.jar", server.uri()),
            &target,
            Some(JAR_BYTES_SHA1),
            |transferred, _| seen = transferred,
        )
        .await
        .unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"jar-bytes");
        assert_eq!(seen, 9);
        assert!(!dir.path().join("server.jar.part").exists());
    }

    #[tokio::test]
    async fn existing_file_with_matching_hash_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/server.jar"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let target = dir.path().join("server.jar");
        tokio::fs::write(&target, b"jar-bytes").await.unwrap();

        download_to_path(
            &Client::new(),
            &format!("{}/server.jar", server.uri()),
            &target,
            Some(JAR_BYTES_SHA1),
            |_, _| {},
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn sha1_mismatch_fails_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/server.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"corrupted".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let target = dir.path().join("server.jar");
        let err = download_to_path(
            &Client::new(),
            &format!("{}/server.jar", server.uri()),
            &target,
            Some(JAR_BYTES_SHA1),
            |_, _| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Metadata(_)), "got {:?}", err);
        assert!(!target.exists());
    }
}
