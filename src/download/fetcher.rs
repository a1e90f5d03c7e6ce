//! Coordinator for concurrent PDF downloads against the shared registry.
//!
//! The fetcher dispatches one Tokio task per record with a downloadable
//! link, bounded by a semaphore, and records the outcome on the registry
//! under its lock. The lock is only ever held for the in-memory status
//! update; the network and disk I/O happen outside it.
//!
//! # Concurrency Model
//!
//! - Each download runs in its own Tokio task
//! - A semaphore permit is acquired before starting each download
//! - Permits are released automatically when downloads complete (RAII)
//! - A failed or timed-out download marks only its own record; siblings
//!   and the run itself continue untouched
//!
//! There is no retry loop: a failed record is reported in the summary and
//! left for the operator to re-run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::filename::build_citation_filename;
use super::rate_limit::RateLimiter;
use super::{DownloadError, HttpClient};
use crate::registry::CitationRegistry;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Error type for fetcher construction.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Statistics from one PDF acquisition batch.
///
/// Uses atomic counters for thread-safe updates from concurrent tasks.
#[derive(Debug, Default)]
pub struct FetchStats {
    downloaded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl FetchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of PDFs written to disk.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Number of downloads that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Number of records skipped for lack of a downloadable link.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    fn increment_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Semaphore-bounded coordinator for concurrent PDF downloads.
#[derive(Debug)]
pub struct PdfFetcher {
    /// Semaphore for concurrency control.
    semaphore: Arc<Semaphore>,
    /// Configured concurrency limit.
    concurrency: usize,
    /// Shared streaming HTTP client.
    client: HttpClient,
    /// Per-host request spacing.
    rate_limiter: Arc<RateLimiter>,
    /// Destination directory, shared across all downloads.
    dest_dir: PathBuf,
}

impl PdfFetcher {
    /// Creates a new fetcher with the specified concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(client, rate_limiter, dest_dir))]
    pub fn new(
        concurrency: usize,
        client: HttpClient,
        rate_limiter: Arc<RateLimiter>,
        dest_dir: impl Into<PathBuf>,
    ) -> Result<Self, FetchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(FetchError::InvalidConcurrency { value: concurrency });
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            client,
            rate_limiter,
            dest_dir: dest_dir.into(),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the destination directory.
    #[must_use]
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Downloads PDFs for the given registry keys concurrently.
    ///
    /// For each key whose record has a downloadable URL (canonical arXiv URL
    /// for preprints, the result's PDF link otherwise):
    /// 1. `pdf_status` → pending (under the registry lock)
    /// 2. a task is spawned behind a semaphore permit
    /// 3. success → `pdf_status = downloaded` + path; any error →
    ///    `pdf_status = failed`; both under the lock, after the I/O
    ///
    /// Records without a link keep `pdf_status = not_requested`.
    ///
    /// Individual download failures never fail the batch: they are counted
    /// in the returned stats and recorded on their records.
    #[instrument(skip(self, registry, keys), fields(count = keys.len(), dest = %self.dest_dir.display()))]
    pub async fn fetch_all(&self, registry: &CitationRegistry, keys: &[String]) -> FetchStats {
        let stats = Arc::new(FetchStats::new());
        let mut handles = Vec::new();

        info!(count = keys.len(), "starting PDF acquisition");

        for key in keys {
            let Some(record) = registry.get(key) else {
                warn!(key = %key, "key missing from registry, skipping");
                stats.increment_skipped();
                continue;
            };

            let Some(url) = record.download_url() else {
                debug!(key = %key, "no downloadable link");
                stats.increment_skipped();
                continue;
            };

            registry.mark_pdf_pending(key);

            // Acquire semaphore permit (blocks if at concurrency limit)
            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                // Only possible if the semaphore were closed; mark the
                // record failed and stop dispatching.
                warn!(key = %key, "semaphore closed, aborting dispatch");
                registry.mark_pdf_failed(key);
                stats.increment_failed();
                break;
            };

            // Clone values for the spawned task
            let registry = registry.clone();
            let client = self.client.clone();
            let rate_limiter = Arc::clone(&self.rate_limiter);
            let stats = Arc::clone(&stats);
            let dest_dir = self.dest_dir.clone();
            let key = key.clone();
            let filename =
                build_citation_filename(&record.title, &record.authors, record.year);

            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;

                rate_limiter.acquire(&url).await;

                match client.download_to_file(&url, &dest_dir, &filename).await {
                    Ok(path) => {
                        info!(key = %key, path = %path.display(), "PDF downloaded");
                        registry.mark_pdf_downloaded(&key, path);
                        stats.increment_downloaded();
                    }
                    Err(error) => {
                        warn!(key = %key, url = %url, error = %error, "PDF download failed");
                        log_error_detail(&error);
                        registry.mark_pdf_failed(&key);
                        stats.increment_failed();
                    }
                }
            }));
        }

        debug!(task_count = handles.len(), "waiting for downloads");

        // Wait for all tasks to complete
        for handle in handles {
            // Task panics are logged but don't fail the batch
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
            }
        }

        info!(
            downloaded = stats.downloaded(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            "PDF acquisition complete"
        );

        // All tasks are done, so we should have sole ownership of the stats.
        match Arc::try_unwrap(stats) {
            Ok(stats) => stats,
            Err(arc_stats) => {
                // Fallback: rebuild from the atomic values
                let new_stats = FetchStats::new();
                new_stats
                    .downloaded
                    .store(arc_stats.downloaded(), Ordering::SeqCst);
                new_stats.failed.store(arc_stats.failed(), Ordering::SeqCst);
                new_stats
                    .skipped
                    .store(arc_stats.skipped(), Ordering::SeqCst);
                new_stats
            }
        }
    }
}

/// Emits a debug-level line with the error chain for diagnosis.
fn log_error_detail(error: &DownloadError) {
    match error {
        DownloadError::Io { path, source } => {
            debug!(path = %path.display(), source = %source, "filesystem failure");
        }
        DownloadError::Network { url, source } => {
            debug!(url = %url, source = %source, "network failure");
        }
        _ => {}
    }
}
