use std::sync::Arc;
use stoker_lib::metadata::{FactsCache, ManifestKind, VersionResolver};
use stoker_lib::MetadataClient;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn manifest_body(server: &MockServer) -> serde_json::Value {
    serde_json::json!({
        "latest": {"release": "1.20.1", "snapshot": "23w31a"},
        "versions": [
            {
                "id": "23w31a",
                "type": "snapshot",
                "url": format!("{}/v/23w31a.json", server.uri()),
                "sha1": "aaa",
                "releaseTime": "2023-08-01T10:00:00+00:00"
            },
            {
                "id": "1.20.1",
                "type": "release",
                "url": format!("{}/v/1.20.1.json", server.uri()),
                "sha1": "bbb",
                "releaseTime": "2023-06-12T13:25:51+00:00"
            },
            {
                "id": "1.20",
                "type": "release",
                "url": format!("{}/v/1.20.json", server.uri()),
                "sha1": "ccc",
                "releaseTime": "2023-06-07T08:36:17+00:00"
            }
        ]
    })
}

fn version_meta(server: bool) -> serde_json::Value {
    let mut downloads = serde_json::json!({
        "client": {"url": "https://example.invalid/client.jar", "sha1": "c", "size": 1}
    });
    if server {
        downloads["server"] =
            serde_json::json!({"url": "https://example.invalid/server.jar", "sha1": "s", "size": 2});
        downloads["server_mappings"] =
            serde_json::json!({"url": "https://example.invalid/maps.txt", "sha1": "m", "size": 3});
    }
    serde_json::json!({"downloads": downloads})
}

async fn mount_version_meta(server: &MockServer, id: &str, has_server: bool, expect: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/v/{}.json", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(version_meta(has_server)))
        .expect(expect)
        .mount(server)
        .await;
}

fn resolver_for(server: &MockServer, cache: Arc<FactsCache>) -> VersionResolver {
    VersionResolver::with_manifest_url(
        MetadataClient::new().unwrap(),
        format!("{}/manifest.json", server.uri()),
        cache,
    )
}

#[tokio::test]
async fn concurrent_manifest_calls_trigger_one_fetch() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_body(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let cache = Arc::new(FactsCache::new(dir.path().join("versions.json")));
    let resolver = resolver_for(&server, cache);

    let (a, b) = tokio::join!(
        resolver.manifest(ManifestKind::All),
        resolver.manifest(ManifestKind::All)
    );
    assert_eq!(a.unwrap().versions.len(), 3);
    assert_eq!(b.unwrap().versions.len(), 3);

    // The expect(1) on the mock verifies the memoization on drop.
}

#[tokio::test]
async fn servers_view_excludes_versions_without_server_artifact() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_body(&server)))
        .mount(&server)
        .await;
    mount_version_meta(&server, "23w31a", true, 1).await;
    mount_version_meta(&server, "1.20.1", true, 1).await;
    mount_version_meta(&server, "1.20", false, 1).await;

    let dir = tempdir().unwrap();
    let cache = Arc::new(FactsCache::new(dir.path().join("versions.json")));
    let resolver = resolver_for(&server, cache);

    let view = resolver.manifest(ManifestKind::Servers).await.unwrap();
    let ids: Vec<&str> = view.versions.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["23w31a", "1.20.1"]);
    // latest.release is the first Release entry the filter keeps.
    assert_eq!(view.latest.release, "1.20.1");
    assert_eq!(view.latest.snapshot, "23w31a");
}

#[tokio::test]
async fn artifact_facts_come_from_disk_cache_on_second_resolver() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_body(&server)))
        .expect(2)
        .mount(&server)
        .await;
    // Per-version metadata is fetched once ever; the second resolver reads
    // the persisted facts file instead.
    mount_version_meta(&server, "23w31a", true, 1).await;
    mount_version_meta(&server, "1.20.1", true, 1).await;
    mount_version_meta(&server, "1.20", false, 1).await;

    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("versions.json");

    let resolver = resolver_for(&server, Arc::new(FactsCache::new(&cache_path)));
    resolver.manifest(ManifestKind::Servers).await.unwrap();
    assert!(cache_path.exists());

    let resolver = resolver_for(&server, Arc::new(FactsCache::new(&cache_path)));
    let view = resolver.manifest(ManifestKind::Servers).await.unwrap();
    assert_eq!(view.versions.len(), 2);
}

#[tokio::test]
async fn resolve_defaults_to_latest_release_of_the_view() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_body(&server)))
        .mount(&server)
        .await;
    mount_version_meta(&server, "23w31a", true, 1).await;
    mount_version_meta(&server, "1.20.1", true, 1).await;
    mount_version_meta(&server, "1.20", false, 1).await;

    let dir = tempdir().unwrap();
    let resolver = resolver_for(
        &server,
        Arc::new(FactsCache::new(dir.path().join("versions.json"))),
    );

    let info = resolver
        .resolve(None, ManifestKind::Servers)
        .await
        .unwrap();
    assert_eq!(info.id, "1.20.1");

    let err = resolver
        .resolve(Some("1.20"), ManifestKind::Servers)
        .await
        .unwrap_err();
    assert!(matches!(err, stoker_lib::Error::Metadata(_)), "got {:?}", err);
}
