//! The per-term ingestion pipeline: search → dedup → PDF fetch → upload.
//!
//! One [`Pipeline`] lives for a whole run and is invoked once per search
//! term. The citation registry and dedup set are shared across terms, so a
//! work discovered under two terms is accepted exactly once. Per-record
//! failures are recorded in the registry and summarized; only a search
//! failure surfaces to the caller (who skips the term and moves on).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument, warn};

use crate::citation::Candidate;
use crate::config::{Config, ConfigError};
use crate::dedup::{self, SeenFile};
use crate::download::{HttpClient, PdfFetcher, RateLimiter};
use crate::registry::{AcceptOutcome, CitationRegistry};
use crate::search::{SearchError, SearchProvider, SerpApiClient};
use crate::upload::{self, UploadStats, ZoteroClient};

/// Per-term outcome counts, reported after every term regardless of
/// per-record failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermSummary {
    /// The search term this summary describes.
    pub term: String,
    /// Candidates returned by the search service.
    pub results: usize,
    /// Candidates accepted into the registry.
    pub accepted: usize,
    /// Candidates rejected as duplicates.
    pub duplicates: usize,
    /// Candidates skipped for lack of any identifier or title.
    pub skipped: usize,
    /// PDFs downloaded this term.
    pub pdf_downloaded: usize,
    /// PDF downloads that failed this term.
    pub pdf_failed: usize,
    /// Records uploaded this term.
    pub uploaded: usize,
    /// Record uploads that failed this term.
    pub upload_failed: usize,
    /// True when an authentication failure halted the upload stage.
    pub uploads_halted: bool,
}

impl fmt::Display for TermSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} results, {} accepted, {} duplicates, pdf {}/{} ok/failed, upload {}/{} ok/failed",
            self.term,
            self.results,
            self.accepted,
            self.duplicates,
            self.pdf_downloaded,
            self.pdf_failed,
            self.uploaded,
            self.upload_failed,
        )?;
        if self.uploads_halted {
            write!(f, " (uploads halted: bad credentials)")?;
        }
        Ok(())
    }
}

/// The citation ingestion pipeline.
///
/// Owns the validated configuration, the shared registry, and the three
/// service clients. Construct once per run via [`Pipeline::from_config`]
/// (production) or [`Pipeline::new`] (tests inject clients pointed at mock
/// servers).
pub struct Pipeline {
    config: Config,
    registry: CitationRegistry,
    provider: Box<dyn SearchProvider>,
    fetcher: PdfFetcher,
    zotero: ZoteroClient,
    seen_file: Option<SeenFile>,
    /// Latched after an authentication failure: the upload stage stays off
    /// for the remainder of the run.
    uploads_halted: AtomicBool,
}

impl Pipeline {
    /// Builds a pipeline from a validated config and explicit clients.
    ///
    /// Creates the download directory if needed and, when a seen-file is
    /// configured, loads it and seeds the dedup set with prior-run keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the download directory cannot be
    /// created or the seen-file cannot be opened, and
    /// [`ConfigError::Invalid`] if the concurrency limit is unusable.
    pub fn new(
        config: Config,
        provider: Box<dyn SearchProvider>,
        zotero: ZoteroClient,
    ) -> Result<Self, ConfigError> {
        if config.enable_pdf_download {
            std::fs::create_dir_all(&config.download_dir).map_err(|e| ConfigError::Io {
                path: config.download_dir.clone(),
                source: e,
            })?;
        }

        let (seen_file, registry) = match &config.seen_file {
            Some(path) => {
                let (seen, keys) = SeenFile::open(path).map_err(|e| ConfigError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                info!(path = %path.display(), keys = keys.len(), "cross-run dedup enabled");
                (Some(seen), CitationRegistry::with_seen_keys(keys))
            }
            None => (None, CitationRegistry::new()),
        };

        let rate_limiter = if config.rate_limit_ms == 0 {
            std::sync::Arc::new(RateLimiter::disabled())
        } else {
            std::sync::Arc::new(RateLimiter::new(std::time::Duration::from_millis(
                config.rate_limit_ms,
            )))
        };

        let fetcher = PdfFetcher::new(
            config.concurrency,
            HttpClient::new(),
            rate_limiter,
            config.download_dir.clone(),
        )
        .map_err(|e| ConfigError::Invalid {
            field: "concurrency",
            reason: e.to_string(),
        })?;

        Ok(Self {
            config,
            registry,
            provider,
            fetcher,
            zotero,
            seen_file,
            uploads_halted: AtomicBool::new(false),
        })
    }

    /// Builds a pipeline with production service endpoints.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Pipeline::new`].
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let provider = Box::new(SerpApiClient::new(
            config.serp_api_key.clone(),
            config.result_limit,
        ));
        let zotero = ZoteroClient::new(
            config.zotero_library_id.clone(),
            config.zotero_api_key.clone(),
        );
        Self::new(config, provider, zotero)
    }

    /// The shared citation registry (for end-of-run reporting).
    #[must_use]
    pub fn registry(&self) -> &CitationRegistry {
        &self.registry
    }

    /// Runs the full pipeline for one search term.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] when the search call itself fails; the term
    /// is then skipped and the caller continues with the next one.
    /// Per-record download/upload failures never surface here - they are
    /// recorded on the records and counted in the summary.
    #[instrument(skip(self))]
    pub async fn run_term(&self, term: &str) -> Result<TermSummary, SearchError> {
        let candidates = self.provider.search(term, self.config.min_year).await?;
        let results = candidates.len();
        info!(term, provider = self.provider.name(), results, "search returned candidates");

        let (accepted_keys, duplicates, skipped) = self.dedup_candidates(candidates);

        let (pdf_downloaded, pdf_failed) =
            if self.config.enable_pdf_download && !accepted_keys.is_empty() {
                let stats = self.fetcher.fetch_all(&self.registry, &accepted_keys).await;
                (stats.downloaded(), stats.failed())
            } else {
                (0, 0)
            };

        let upload = if self.uploads_halted.load(Ordering::SeqCst) {
            warn!(term, "upload stage disabled after earlier authentication failure");
            UploadStats::default()
        } else {
            let stats = upload::upload_pending(&self.zotero, &self.registry).await;
            if stats.halted {
                self.uploads_halted.store(true, Ordering::SeqCst);
            }
            stats
        };

        Ok(TermSummary {
            term: term.to_string(),
            results,
            accepted: accepted_keys.len(),
            duplicates,
            skipped,
            pdf_downloaded,
            pdf_failed,
            uploaded: upload.uploaded,
            upload_failed: upload.failed,
            uploads_halted: upload.halted,
        })
    }

    /// Sequential, order-stable dedup over one term's candidates.
    ///
    /// Given two candidates with the same key in one batch, the first is
    /// kept and the second rejected - order comes from the search service.
    fn dedup_candidates(&self, candidates: Vec<Candidate>) -> (Vec<String>, usize, usize) {
        let mut accepted_keys = Vec::new();
        let mut duplicates = 0;
        let mut skipped = 0;

        for candidate in candidates {
            let key = dedup::derive_key(&candidate);
            if key.is_empty() {
                warn!(title = %candidate.title, "candidate has no identifier or title; skipping");
                skipped += 1;
                continue;
            }

            match self.registry.accept(key.clone(), &candidate) {
                AcceptOutcome::Accepted(_) => {
                    if let Some(seen) = &self.seen_file
                        && let Err(error) = seen.append(&key)
                    {
                        // Persistence is best-effort; in-memory dedup still holds.
                        warn!(key = %key, error = %error, "failed to append to seen-file");
                    }
                    accepted_keys.push(key);
                }
                AcceptOutcome::Duplicate => duplicates += 1,
            }
        }

        (accepted_keys, duplicates, skipped)
    }
}
