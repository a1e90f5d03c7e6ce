//! Integration tests for the download module.
//!
//! These tests verify the streaming client and the concurrent fetcher
//! against a mock PDF host.

use std::sync::Arc;

use citesync_core::citation::{Candidate, PdfStatus};
use citesync_core::download::{DownloadError, HttpClient, PdfFetcher, RateLimiter};
use citesync_core::registry::CitationRegistry;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a mock server with a file endpoint.
async fn setup_mock_file(path_str: &str, content: &[u8]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    mock_server
}

fn test_rate_limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::disabled())
}

// ==================== HttpClient Tests ====================

#[tokio::test]
async fn test_download_full_flow_preserves_content() {
    let content = b"%PDF-1.5 fake pdf body for testing.\nLine 2.\nLine 3.";
    let mock_server = setup_mock_file("/document.pdf", content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let client = HttpClient::new();
    let url = format!("{}/document.pdf", mock_server.uri());
    let result = client
        .download_to_file(&url, temp_dir.path(), "Smith_2024_Study.pdf")
        .await;

    assert!(result.is_ok(), "Download should succeed: {:?}", result.err());

    let file_path = result.unwrap();
    assert!(file_path.exists(), "Downloaded file should exist");
    assert_eq!(
        file_path.file_name().unwrap().to_str().unwrap(),
        "Smith_2024_Study.pdf"
    );

    let downloaded_content = std::fs::read(&file_path).expect("should read file");
    assert_eq!(downloaded_content, content);
}

#[tokio::test]
async fn test_download_handles_404_gracefully() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/not-found"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = HttpClient::new();
    let url = format!("{}/not-found", mock_server.uri());
    let result = client
        .download_to_file(&url, temp_dir.path(), "missing.pdf")
        .await;

    match result {
        Err(DownloadError::HttpStatus {
            status,
            url: err_url,
        }) => {
            assert_eq!(status, 404);
            assert!(err_url.contains("/not-found"));
        }
        other => panic!("Expected HttpStatus(404), got: {other:?}"),
    }
}

#[tokio::test]
async fn test_download_invalid_url() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let client = HttpClient::new();
    let result = client
        .download_to_file("not a url", temp_dir.path(), "x.pdf")
        .await;
    assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_download_resolves_filename_collision() {
    let mock_server = setup_mock_file("/doc.pdf", b"content").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    // Create existing file under the preferred name
    std::fs::write(temp_dir.path().join("Smith_2024_Study.pdf"), b"existing")
        .expect("should create file");

    let client = HttpClient::new();
    let url = format!("{}/doc.pdf", mock_server.uri());
    let file_path = client
        .download_to_file(&url, temp_dir.path(), "Smith_2024_Study.pdf")
        .await
        .unwrap();

    assert_eq!(
        file_path.file_name().unwrap().to_str().unwrap(),
        "Smith_2024_Study_1.pdf"
    );
    // The original file is untouched
    assert_eq!(
        std::fs::read(temp_dir.path().join("Smith_2024_Study.pdf")).unwrap(),
        b"existing"
    );
}

// ==================== PdfFetcher Tests ====================

fn accept(registry: &CitationRegistry, key: &str, title: &str, link: Option<String>) {
    let outcome = registry.accept(
        key.to_string(),
        &Candidate {
            title: title.to_string(),
            authors: "A Tester".to_string(),
            year: Some(2024),
            source_link: link,
            ..Candidate::default()
        },
    );
    assert!(outcome.is_accepted());
}

#[tokio::test]
async fn test_fetch_all_downloads_concurrently_and_updates_registry() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    for i in 0..8 {
        Mock::given(method("GET"))
            .and(path(format!("/paper-{i}.pdf")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("pdf {i}")))
            .mount(&mock_server)
            .await;
    }

    let registry = CitationRegistry::new();
    let mut keys = Vec::new();
    for i in 0..8 {
        let key = format!("10.1234/paper-{i}");
        accept(
            &registry,
            &key,
            &format!("Paper Number {i}"),
            Some(format!("{}/paper-{i}.pdf", mock_server.uri())),
        );
        keys.push(key);
    }

    let fetcher =
        PdfFetcher::new(4, HttpClient::new(), test_rate_limiter(), temp_dir.path()).unwrap();

    let stats = fetcher.fetch_all(&registry, &keys).await;

    assert_eq!(stats.downloaded(), 8);
    assert_eq!(stats.failed(), 0);

    // Every record must carry downloaded status plus an existing path.
    for key in &keys {
        let record = registry.get(key).unwrap();
        assert_eq!(record.pdf_status, PdfStatus::Downloaded);
        assert!(record.pdf_path.unwrap().exists());
    }
}

#[tokio::test]
async fn test_fetch_all_isolates_failures() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/good.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"good pdf".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(
        &registry,
        "good",
        "Good Paper",
        Some(format!("{}/good.pdf", mock_server.uri())),
    );
    accept(
        &registry,
        "bad",
        "Gone Paper",
        Some(format!("{}/gone.pdf", mock_server.uri())),
    );

    let fetcher =
        PdfFetcher::new(2, HttpClient::new(), test_rate_limiter(), temp_dir.path()).unwrap();

    let stats = fetcher
        .fetch_all(&registry, &["good".to_string(), "bad".to_string()])
        .await;

    // One failed download must not prevent the other from completing.
    assert_eq!(stats.downloaded(), 1);
    assert_eq!(stats.failed(), 1);
    assert_eq!(
        registry.get("good").unwrap().pdf_status,
        PdfStatus::Downloaded
    );
    assert_eq!(registry.get("bad").unwrap().pdf_status, PdfStatus::Failed);
}

#[tokio::test]
async fn test_fetch_all_identical_filenames_never_overwrite() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    for i in 0..4 {
        Mock::given(method("GET"))
            .and(path(format!("/same-{i}.pdf")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("body {i}")))
            .mount(&mock_server)
            .await;
    }

    // Four records with identical metadata produce identical preferred names;
    // collision resolution must give each its own file.
    let registry = CitationRegistry::new();
    let mut keys = Vec::new();
    for i in 0..4 {
        let key = format!("10.1234/same-{i}");
        accept(
            &registry,
            &key,
            "Same Title",
            Some(format!("{}/same-{i}.pdf", mock_server.uri())),
        );
        keys.push(key);
    }

    let fetcher =
        PdfFetcher::new(4, HttpClient::new(), test_rate_limiter(), temp_dir.path()).unwrap();

    let stats = fetcher.fetch_all(&registry, &keys).await;
    assert_eq!(stats.downloaded(), 4);

    let mut paths: Vec<_> = keys
        .iter()
        .map(|k| registry.get(k).unwrap().pdf_path.unwrap())
        .collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 4, "each download must land in its own file");

    let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
    assert_eq!(entries, 4);
}
