//! Zotero upload stage: item creation and PDF attachment.
//!
//! Each registry entry still awaiting upload gets a create-item request;
//! records with a downloaded PDF get a follow-up child-attachment upload.
//! Failures are isolated per record, with one exception: an authentication
//! failure halts the rest of the stage - there is no point retrying other
//! records with rejected credentials.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::citation::{CitationRecord, PdfStatus};
use crate::registry::CitationRegistry;

/// Production endpoint; overridable for tests.
const DEFAULT_BASE_URL: &str = "https://api.zotero.org";

/// Zotero Web API schema version header value.
const API_VERSION: &str = "3";

/// Connect timeout for citation-store calls.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for citation-store calls (attachment bodies can be large).
const READ_TIMEOUT_SECS: u64 = 120;

/// Errors from a citation-store call.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The store rejected the credentials. Fatal for the rest of the stage.
    #[error("citation store rejected credentials (HTTP {status})")]
    Auth {
        /// The HTTP status code (401 or 403).
        status: u16,
    },

    /// Any other HTTP error response.
    #[error("citation store returned HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The store accepted the batch but rejected this item.
    #[error("citation store rejected the item: {message}")]
    Rejected {
        /// The store's rejection message.
        message: String,
    },

    /// Network-level error (DNS, connection refused, TLS, etc.)
    #[error("network error calling citation store: {source}")]
    Network {
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout calling citation store")]
    Timeout,

    /// The response body could not be interpreted.
    #[error("malformed citation-store response: {reason}")]
    Malformed {
        /// What went wrong while decoding.
        reason: String,
    },

    /// The local attachment file could not be read.
    #[error("IO error reading attachment {path}: {source}")]
    Io {
        /// The attachment path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn request(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout
        } else {
            Self::Network { source }
        }
    }

    /// Creates the appropriate error for a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            _ => Self::HttpStatus { status },
        }
    }

    /// True for authentication failures, which halt the upload stage.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Counts from one upload-stage drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Records uploaded (item created, attachment included when present).
    pub uploaded: usize,
    /// Records whose upload failed.
    pub failed: usize,
    /// True when an authentication failure stopped the drain early.
    pub halted: bool,
}

/// Client for the Zotero Web API (the citation store).
///
/// Created once per run and reused; requests carry the library id in the
/// path and the API key in a header.
#[derive(Debug, Clone)]
pub struct ZoteroClient {
    client: reqwest::Client,
    base_url: String,
    library_id: String,
    api_key: String,
}

impl ZoteroClient {
    /// Creates a client against the production Zotero endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new(library_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(library_id, api_key, DEFAULT_BASE_URL)
    }

    /// Creates a client against an explicit base URL (used by tests to point
    /// at a mock server).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_base_url(
        library_id: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            library_id: library_id.into(),
            api_key: api_key.into(),
        }
    }

    fn items_url(&self) -> String {
        format!("{}/users/{}/items", self.base_url, self.library_id)
    }

    /// Creates one item from the record's metadata and returns its key.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] on auth rejection, HTTP errors, per-item
    /// rejection, network failure, timeout, or an uninterpretable response.
    #[instrument(skip(self, record), fields(key = %record.dedup_key))]
    pub async fn create_item(&self, record: &CitationRecord) -> Result<String, UploadError> {
        let payload = json!([item_payload(record)]);
        self.post_items(&payload).await
    }

    /// Attaches a downloaded PDF as a child of `parent_key`.
    ///
    /// Two requests: create the child attachment item, then upload the file
    /// bytes against it.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] if either request fails or the local file
    /// cannot be read.
    #[instrument(skip(self), fields(parent = %parent_key, path = %pdf_path.display()))]
    pub async fn attach_pdf(
        &self,
        parent_key: &str,
        pdf_path: &Path,
    ) -> Result<(), UploadError> {
        let filename = pdf_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment.pdf");

        let payload = json!([{
            "itemType": "attachment",
            "linkMode": "imported_file",
            "parentItem": parent_key,
            "title": filename,
            "filename": filename,
            "contentType": "application/pdf",
        }]);
        let attachment_key = self.post_items(&payload).await?;

        let bytes = tokio::fs::read(pdf_path)
            .await
            .map_err(|e| UploadError::Io {
                path: pdf_path.to_path_buf(),
                source: e,
            })?;

        let url = format!("{}/{attachment_key}/file", self.items_url());
        let response = self
            .client
            .post(&url)
            .header("Zotero-API-Version", API_VERSION)
            .header("Zotero-API-Key", &self.api_key)
            .header("If-None-Match", "*")
            .body(bytes)
            .send()
            .await
            .map_err(UploadError::request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::from_status(status.as_u16()));
        }

        debug!(attachment = %attachment_key, "attachment uploaded");
        Ok(())
    }

    /// POSTs a one-item batch and extracts the created item's key.
    async fn post_items(&self, payload: &Value) -> Result<String, UploadError> {
        let response = self
            .client
            .post(self.items_url())
            .header("Zotero-API-Version", API_VERSION)
            .header("Zotero-API-Key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(UploadError::request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::from_status(status.as_u16()));
        }

        let body: WriteResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Malformed {
                reason: e.to_string(),
            })?;

        body.created_key().ok_or_else(|| match body.failed.get("0") {
            Some(failure) => UploadError::Rejected {
                message: failure.message.clone(),
            },
            None => UploadError::Malformed {
                reason: "write response contains no created item".to_string(),
            },
        })
    }
}

/// Zotero write-response envelope (fields we consume).
#[derive(Debug, Default, Deserialize)]
struct WriteResponse {
    /// Index → full created item.
    #[serde(default)]
    successful: HashMap<String, SuccessfulItem>,
    /// Index → created item key (older, compact form).
    #[serde(default)]
    success: HashMap<String, String>,
    /// Index → rejection.
    #[serde(default)]
    failed: HashMap<String, FailedItem>,
}

impl WriteResponse {
    fn created_key(&self) -> Option<String> {
        self.successful
            .get("0")
            .map(|item| item.key.clone())
            .or_else(|| self.success.get("0").cloned())
    }
}

#[derive(Debug, Deserialize)]
struct SuccessfulItem {
    key: String,
}

#[derive(Debug, Default, Deserialize)]
struct FailedItem {
    #[serde(default)]
    message: String,
}

/// Builds the journal-article JSON payload for one record.
fn item_payload(record: &CitationRecord) -> Value {
    let creators: Vec<Value> = record
        .authors
        .split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| json!({ "creatorType": "author", "name": name }))
        .collect();

    let mut item = json!({
        "itemType": "journalArticle",
        "title": record.title,
        "creators": creators,
    });

    // Map fields individually: Zotero rejects null-valued keys.
    if let Some(map) = item.as_object_mut() {
        if let Some(year) = record.year {
            map.insert("date".to_string(), json!(year.to_string()));
        }
        if let Some(doi) = &record.doi {
            map.insert("DOI".to_string(), json!(doi));
        }
        if let Some(link) = &record.source_link {
            map.insert("url".to_string(), json!(link));
        }
    }

    item
}

/// Drains every pending record through the citation store.
///
/// Uploads are sequential; order follows registry acceptance order, though
/// nothing depends on it. Per-record failures are recorded and skipped; an
/// authentication failure marks the current record failed and halts the
/// drain (`stats.halted = true`), leaving the rest pending.
///
/// An attachment is only ever attempted after its record's own create-item
/// call succeeded.
#[instrument(skip(client, registry))]
pub async fn upload_pending(client: &ZoteroClient, registry: &CitationRegistry) -> UploadStats {
    let mut stats = UploadStats::default();

    for record in registry.pending_uploads() {
        let key = record.dedup_key.clone();

        let item_key = match client.create_item(&record).await {
            Ok(item_key) => item_key,
            Err(error) => {
                warn!(key = %key, error = %error, "item creation failed");
                registry.mark_upload_failed(&key, error.to_string());
                stats.failed += 1;
                if error.is_auth() {
                    warn!("authentication failure: halting upload stage");
                    stats.halted = true;
                    break;
                }
                continue;
            }
        };

        if record.pdf_status == PdfStatus::Downloaded
            && let Some(pdf_path) = &record.pdf_path
        {
            if let Err(error) = client.attach_pdf(&item_key, pdf_path).await {
                warn!(key = %key, error = %error, "attachment failed");
                registry.mark_upload_failed(&key, error.to_string());
                stats.failed += 1;
                if error.is_auth() {
                    warn!("authentication failure: halting upload stage");
                    stats.halted = true;
                    break;
                }
                continue;
            }
        }

        info!(key = %key, item = %item_key, "record uploaded");
        registry.mark_uploaded(&key);
        stats.uploaded += 1;
    }

    stats
}
