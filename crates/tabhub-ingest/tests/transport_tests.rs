//! Transport tests against a local mock HTTP server
//!
//! Covers:
//! - web downloads and the redirect hop limit
//! - per-source failure isolation and the missing source file error
//! - destination rewrites (header injection, separator remap)
//! - zip extraction and gzip raw GitHub files

#![allow(clippy::unwrap_used, clippy::expect_used)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tabhub_ingest::config::{IngestConfig, ObjectStoreConfig};
use tabhub_ingest::transport::{
    GithubSource, Transport, TransportDefinition, TransportDestination, TransportError,
    TransportOptions, TransportProgress, TransportSources, WebExecutor, WebSource,
};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(root: &Path) -> IngestConfig {
    IngestConfig {
        staging_dir: root.join("staging"),
        ..IngestConfig::default()
    }
}

fn transport(root: &Path, definition: TransportDefinition) -> Transport {
    Transport::with_config(definition, &config(root), ObjectStoreConfig::default()).unwrap()
}

async fn serve(server: &MockServer, route: &str, body: impl Into<Vec<u8>>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
        .mount(server)
        .await;
}

/// Chain `/hop0 -> /hop1 -> ... -> /hop{hops}` where the last hop serves `body`
async fn redirect_chain(server: &MockServer, hops: usize, body: &str) {
    for hop in 0..hops {
        Mock::given(method("GET"))
            .and(path(format!("/hop{}", hop)))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/hop{}", server.uri(), hop + 1)),
            )
            .mount(server)
            .await;
    }
    serve(server, &format!("/hop{}", hops), body.to_string()).await;
}

fn staged_dirs(root: &Path) -> usize {
    std::fs::read_dir(root.join("staging"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

// ============================================================================
// Web executor
// ============================================================================

#[tokio::test]
async fn test_redirects_within_limit() {
    let server = MockServer::start().await;
    redirect_chain(&server, 3, "a,b\n").await;

    let dir = tempfile::tempdir().unwrap();
    let web = WebExecutor::new(&IngestConfig::default()).unwrap();
    let destination = dir.path().join("out.csv");
    let bytes = web
        .download(&format!("{}/hop0", server.uri()), &destination, 3, None)
        .await
        .unwrap();

    assert_eq!(bytes, 4);
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "a,b\n");
}

#[tokio::test]
async fn test_too_many_redirects() {
    let server = MockServer::start().await;
    redirect_chain(&server, 4, "never").await;

    let dir = tempfile::tempdir().unwrap();
    let web = WebExecutor::new(&IngestConfig::default()).unwrap();
    let destination = dir.path().join("out.csv");
    let err = web
        .download(&format!("{}/hop0", server.uri()), &destination, 3, None)
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::TooManyRedirects { limit: 3, .. }));
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_non_200_is_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.csv"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let web = WebExecutor::new(&IngestConfig::default()).unwrap();
    let err = web
        .download(&format!("{}/gone.csv", server.uri()), &dir.path().join("x"), 3, None)
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Download { status: 404, .. }));
}

#[tokio::test]
async fn test_download_reports_progress() {
    let server = MockServer::start().await;
    let body = "x".repeat(10_000);
    serve(&server, "/big.csv", body.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let web = WebExecutor::new(&IngestConfig::default()).unwrap();
    let seen = Mutex::new(Vec::new());
    let progress = |downloaded: u64, total: Option<u64>, delta: u64| {
        seen.lock().unwrap().push((downloaded, total, delta));
    };

    web.download(
        &format!("{}/big.csv", server.uri()),
        &dir.path().join("big.csv"),
        3,
        Some(&progress as &dyn TransportProgress),
    )
    .await
    .unwrap();

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.first(), Some(&(0, Some(10_000), 0)));
    let (downloaded, total, _) = *seen.last().unwrap();
    assert_eq!(downloaded, 10_000);
    assert_eq!(total, Some(10_000));
    assert_eq!(seen.iter().map(|(_, _, delta)| delta).sum::<u64>(), 10_000);
}

// ============================================================================
// Orchestrator
// ============================================================================

#[tokio::test]
async fn test_web_transport_with_rewrite() {
    let server = MockServer::start().await;
    serve(&server, "/files/raw.tsv", "1\tAlice\n2\tBob \"B\"\n").await;
    serve(&server, "/files/plain.csv", "id,name\n").await;

    let dir = tempfile::tempdir().unwrap();
    let definition = TransportDefinition::from_json(&format!(
        r#"{{
            "type": "web",
            "source": [
                {{ "url": "{uri}/files/raw.tsv" }},
                {{ "url": "{uri}/files/plain.csv", "name": "nested/plain.csv" }}
            ],
            "destination": [
                {{ "source": "raw.tsv", "file": "people.csv", "add_header": ["id", "name"], "map_separator": "\t" }},
                {{ "source": "nested/plain.csv" }}
            ]
        }}"#,
        uri = server.uri()
    ))
    .unwrap();

    let out = dir.path().join("out");
    let result = transport(dir.path(), definition)
        .run(TransportOptions {
            destination: Some(out.clone()),
            ..TransportOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(result, out);
    assert_eq!(
        std::fs::read_to_string(out.join("people.csv")).unwrap(),
        "\"id\",\"name\"\n\"1\",\"Alice\"\n\"2\",\"Bob \"\"B\"\"\"\n"
    );
    assert_eq!(
        std::fs::read_to_string(out.join("nested/plain.csv")).unwrap(),
        "id,name\n"
    );
    assert_eq!(staged_dirs(dir.path()), 0);
}

#[tokio::test]
async fn test_unreachable_source_does_not_block_others() {
    let server = MockServer::start().await;
    serve(&server, "/ok.csv", "a\n1\n").await;

    let dir = tempfile::tempdir().unwrap();
    let sources = TransportSources::Web(vec![
        WebSource::new("http://tabhub-unreachable.invalid/missing.csv"),
        WebSource::new(format!("{}/ok.csv", server.uri())),
    ]);
    let definition = TransportDefinition::new(sources, vec![TransportDestination::new("ok.csv")]);

    let out = dir.path().join("out");
    transport(dir.path(), definition)
        .run(TransportOptions {
            destination: Some(out.clone()),
            ..TransportOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(out.join("ok.csv")).unwrap(), "a\n1\n");
}

#[tokio::test]
async fn test_unreachable_source_fails_with_missing_file() {
    let server = MockServer::start().await;
    serve(&server, "/ok.csv", "a\n1\n").await;

    let dir = tempfile::tempdir().unwrap();
    let sources = TransportSources::Web(vec![
        WebSource::new("http://tabhub-unreachable.invalid/missing.csv"),
        WebSource::new(format!("{}/ok.csv", server.uri())),
    ]);
    let definition = TransportDefinition::new(
        sources,
        vec![
            TransportDestination::new("ok.csv"),
            TransportDestination::new("missing.csv"),
        ],
    );

    let err = transport(dir.path(), definition)
        .run(TransportOptions {
            destination: Some(dir.path().join("out")),
            ..TransportOptions::default()
        })
        .await
        .unwrap_err();

    match err {
        TransportError::MissingSourceFile(path) => assert!(path.ends_with("missing.csv")),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(staged_dirs(dir.path()), 0);
}

#[tokio::test]
async fn test_failed_download_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.csv"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut definition = TransportDefinition::new(
        TransportSources::Web(vec![WebSource::new(format!("{}/broken.csv", server.uri()))]),
        vec![TransportDestination::new("broken.csv")],
    );
    definition.clean = false;

    let err = transport(dir.path(), definition)
        .run(TransportOptions {
            destination: Some(dir.path().join("out")),
            ..TransportOptions::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::MissingSourceFile(_)));
    // Staging directory is kept when cleaning is disabled
    assert_eq!(staged_dirs(dir.path()), 1);
}

#[tokio::test]
async fn test_use_cache_skips_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh\n"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let definition = TransportDefinition::new(
        TransportSources::Web(vec![WebSource::new(format!("{}/data.csv", server.uri()))]),
        vec![TransportDestination::new("data.csv")],
    );
    let transport = transport(dir.path(), definition);
    let options = TransportOptions {
        destination: Some(dir.path().join("out")),
        use_cache: true,
        verbose: false,
    };

    transport.run(options.clone()).await.unwrap();
    transport.run(options).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("out/data.csv")).unwrap(),
        "fresh\n"
    );
}

#[tokio::test]
async fn test_web_unzip() {
    let mut archive = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut archive));
        writer
            .start_file("table.csv", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"k,v\n").unwrap();
        writer.finish().unwrap();
    }

    let server = MockServer::start().await;
    serve(&server, "/bundle.zip", archive).await;

    let dir = tempfile::tempdir().unwrap();
    let mut source = WebSource::new(format!("{}/bundle.zip", server.uri()));
    source.unzip = true;
    let definition = TransportDefinition::new(
        TransportSources::Web(vec![source]),
        vec![TransportDestination {
            source: "bundle/table.csv".to_string(),
            file: Some("table.csv".to_string()),
            add_header: None,
            map_separator: None,
        }],
    );

    let out = dir.path().join("out");
    transport(dir.path(), definition)
        .run(TransportOptions {
            destination: Some(out.clone()),
            ..TransportOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(out.join("table.csv")).unwrap(), "k,v\n");
}

#[tokio::test]
async fn test_github_raw_gzip_file() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"x,y\n1,2\n").unwrap();
    let compressed = encoder.finish().unwrap();

    let server = MockServer::start().await;
    serve(&server, "/owner/repo/raw/refs/heads/main/exports/data.csv.gz", compressed).await;

    let dir = tempfile::tempdir().unwrap();
    let definition = TransportDefinition::new(
        TransportSources::Github(vec![GithubSource {
            repository: "owner/repo".to_string(),
            branch: "main".to_string(),
            file: Some("exports/data.csv.gz".to_string()),
            name: None,
        }]),
        vec![TransportDestination::new("data.csv")],
    );

    let out = dir.path().join("out");
    transport(dir.path(), definition)
        .with_github_base(Url::parse(&format!("{}/", server.uri())).unwrap())
        .run(TransportOptions {
            destination: Some(out.clone()),
            ..TransportOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(out.join("data.csv")).unwrap(), "x,y\n1,2\n");
}
