//! HTTP client wrapper for downloading PDFs.
//!
//! This module provides the `HttpClient` struct which handles streaming
//! downloads with proper timeout configuration and error handling. The
//! filename is chosen by the caller (derived from the citation record) and
//! collision-resolved against the destination directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::error::DownloadError;
use super::filename::{numbered_filename, safe_filename};

/// Default connect timeout in seconds.
pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout in seconds (PDFs from slow hosts can take a while).
pub(crate) const READ_TIMEOUT_SECS: u64 = 300;

/// HTTP client for downloading files with streaming support.
///
/// This client is designed to be created once and reused for multiple
/// downloads, taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Downloads a file from `url` into `output_dir` under `preferred_filename`.
    ///
    /// The name is claimed with an atomic create-if-absent open, adding
    /// numeric suffixes on collision, so concurrent downloads sharing the
    /// directory can never overwrite each other's output. The response body
    /// then streams straight to disk.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - Writing to disk fails
    #[must_use = "download result contains the path to the downloaded file"]
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download_to_file(
        &self,
        url: &str,
        output_dir: &Path,
        preferred_filename: &str,
    ) -> Result<PathBuf, DownloadError> {
        if Url::parse(url).is_err() {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let (file, path) = create_unique_file(output_dir, preferred_filename).await?;
        let mut writer = BufWriter::new(file);

        let write_result: Result<u64, DownloadError> = async {
            let mut stream = response.bytes_stream();
            let mut bytes_written: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| DownloadError::request(url, e))?;
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| DownloadError::io(&path, e))?;
                bytes_written += chunk.len() as u64;
            }
            writer
                .flush()
                .await
                .map_err(|e| DownloadError::io(&path, e))?;
            Ok(bytes_written)
        }
        .await;

        match write_result {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "download written");
                Ok(path)
            }
            Err(error) => {
                // The name was already claimed; don't leave partial output behind.
                let _ = tokio::fs::remove_file(&path).await;
                Err(error)
            }
        }
    }
}

/// Claims a unique filename in `dir` with an atomic create-if-absent open.
///
/// `create_new` makes the claim atomic: two tasks racing for the same name
/// cannot both win it, so each falls through to the next numeric suffix.
async fn create_unique_file(
    dir: &Path,
    preferred_filename: &str,
) -> Result<(File, PathBuf), DownloadError> {
    let base = safe_filename(preferred_filename);

    for attempt in 0..1000 {
        let name = if attempt == 0 {
            base.clone()
        } else {
            numbered_filename(&base, attempt)
        };
        let path = dir.join(&name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(DownloadError::io(path, e)),
        }
    }

    // 1000 existing variants of one name means something else is wrong.
    Err(DownloadError::io(
        dir.join(&base),
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "exhausted filename disambiguation suffixes",
        ),
    ))
}
