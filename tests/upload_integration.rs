//! Integration tests for the Zotero upload stage.
//!
//! These tests verify item creation, attachment upload, per-record failure
//! isolation, and the authentication halt against a mock citation store.

use citesync_core::citation::{Candidate, UploadStatus};
use citesync_core::registry::CitationRegistry;
use citesync_core::upload::{ZoteroClient, upload_pending};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn created(key: &str) -> serde_json::Value {
    json!({ "successful": { "0": { "key": key } }, "failed": {} })
}

fn accept(registry: &CitationRegistry, key: &str, title: &str) {
    let outcome = registry.accept(
        key.to_string(),
        &Candidate {
            title: title.to_string(),
            authors: "J Smith".to_string(),
            year: Some(2024),
            doi: Some(key.to_string()),
            ..Candidate::default()
        },
    );
    assert!(outcome.is_accepted());
}

#[tokio::test]
async fn test_create_item_returns_key_and_sends_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .and(header("Zotero-API-Key", "zot-key"))
        .and(header("Zotero-API-Version", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("ABCD2345")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/example", "A Study");
    let record = registry.get("10.1234/example").unwrap();

    let client = ZoteroClient::with_base_url("1234567", "zot-key", mock_server.uri());
    let key = client.create_item(&record).await.unwrap();
    assert_eq!(key, "ABCD2345");
}

#[tokio::test]
async fn test_upload_pending_marks_records_uploaded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("ITEM1111")))
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/a", "First Work");
    accept(&registry, "10.1234/b", "Second Work");

    let client = ZoteroClient::with_base_url("1234567", "zot-key", mock_server.uri());
    let stats = upload_pending(&client, &registry).await;

    assert_eq!(stats.uploaded, 2);
    assert_eq!(stats.failed, 0);
    assert!(!stats.halted);
    assert_eq!(
        registry.get("10.1234/a").unwrap().upload_status,
        UploadStatus::Uploaded
    );
    assert_eq!(
        registry.get("10.1234/b").unwrap().upload_status,
        UploadStatus::Uploaded
    );
}

#[tokio::test]
async fn test_failed_upload_does_not_block_the_next_record() {
    let mock_server = MockServer::start().await;

    // First create-item call fails with a server error, the second succeeds.
    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("ITEM2222")))
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/a", "Fails First");
    accept(&registry, "10.1234/b", "Succeeds After");

    let client = ZoteroClient::with_base_url("1234567", "zot-key", mock_server.uri());
    let stats = upload_pending(&client, &registry).await;

    assert_eq!(stats.uploaded, 1);
    assert_eq!(stats.failed, 1);
    assert!(!stats.halted);

    let failed = registry.get("10.1234/a").unwrap();
    assert_eq!(failed.upload_status, UploadStatus::Failed);
    assert!(failed.upload_error.unwrap().contains("500"));
    assert_eq!(
        registry.get("10.1234/b").unwrap().upload_status,
        UploadStatus::Uploaded
    );
}

#[tokio::test]
async fn test_auth_failure_halts_remaining_uploads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/a", "First Work");
    accept(&registry, "10.1234/b", "Second Work");
    accept(&registry, "10.1234/c", "Third Work");

    let client = ZoteroClient::with_base_url("1234567", "bad-key", mock_server.uri());
    let stats = upload_pending(&client, &registry).await;

    // The failing record is marked, and nothing further is attempted.
    assert_eq!(stats.uploaded, 0);
    assert_eq!(stats.failed, 1);
    assert!(stats.halted);
    assert_eq!(
        registry.get("10.1234/a").unwrap().upload_status,
        UploadStatus::Failed
    );
    assert_eq!(
        registry.get("10.1234/b").unwrap().upload_status,
        UploadStatus::Pending
    );
    assert_eq!(
        registry.get("10.1234/c").unwrap().upload_status,
        UploadStatus::Pending
    );
}

#[tokio::test]
async fn test_item_rejection_is_recorded_with_reason() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "successful": {},
            "failed": { "0": { "code": 400, "message": "Invalid value for itemType" } }
        })))
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/a", "Rejected Work");

    let client = ZoteroClient::with_base_url("1234567", "zot-key", mock_server.uri());
    let stats = upload_pending(&client, &registry).await;

    assert_eq!(stats.failed, 1);
    assert!(!stats.halted);
    let record = registry.get("10.1234/a").unwrap();
    assert!(
        record
            .upload_error
            .unwrap()
            .contains("Invalid value for itemType")
    );
}

#[tokio::test]
async fn test_downloaded_pdf_is_attached_after_item_creation() {
    let mock_server = MockServer::start().await;
    let temp_dir = tempfile::TempDir::new().unwrap();
    let pdf_path = temp_dir.path().join("Smith_2024_Work.pdf");
    std::fs::write(&pdf_path, b"%PDF-1.5 body").unwrap();

    // First items POST creates the article, second creates the attachment item.
    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("ITEM1111")))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("ATT22222")))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    // File bytes land on the attachment item.
    Mock::given(method("POST"))
        .and(path("/users/1234567/items/ATT22222/file"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/work", "Attached Work");
    registry.mark_pdf_downloaded("10.1234/work", pdf_path);

    let client = ZoteroClient::with_base_url("1234567", "zot-key", mock_server.uri());
    let stats = upload_pending(&client, &registry).await;

    assert_eq!(stats.uploaded, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(
        registry.get("10.1234/work").unwrap().upload_status,
        UploadStatus::Uploaded
    );
}

#[tokio::test]
async fn test_failed_attachment_marks_record_failed() {
    let mock_server = MockServer::start().await;
    let temp_dir = tempfile::TempDir::new().unwrap();
    let pdf_path = temp_dir.path().join("Smith_2024_Work.pdf");
    std::fs::write(&pdf_path, b"%PDF-1.5 body").unwrap();

    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("ITEM1111")))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    // Attachment item creation blows up.
    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/work", "Attached Work");
    registry.mark_pdf_downloaded("10.1234/work", pdf_path);

    let client = ZoteroClient::with_base_url("1234567", "zot-key", mock_server.uri());
    let stats = upload_pending(&client, &registry).await;

    assert_eq!(stats.uploaded, 0);
    assert_eq!(stats.failed, 1);
    assert_eq!(
        registry.get("10.1234/work").unwrap().upload_status,
        UploadStatus::Failed
    );
}

#[tokio::test]
async fn test_metadata_only_upload_after_pdf_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/1234567/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(created("ITEM1111")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = CitationRegistry::new();
    accept(&registry, "10.1234/work", "Unfetchable Work");
    registry.mark_pdf_failed("10.1234/work");

    let client = ZoteroClient::with_base_url("1234567", "zot-key", mock_server.uri());
    let stats = upload_pending(&client, &registry).await;

    // A failed PDF download must not prevent the metadata-only upload.
    assert_eq!(stats.uploaded, 1);
    assert_eq!(
        registry.get("10.1234/work").unwrap().upload_status,
        UploadStatus::Uploaded
    );
}
