//! Concurrent PDF acquisition for accepted citation records.
//!
//! This module provides the streaming HTTP client, deterministic filename
//! derivation, per-host request spacing, and the semaphore-bounded
//! [`PdfFetcher`] that coordinates concurrent downloads against the shared
//! citation registry.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Deterministic `Author_Year_Title.pdf` naming with collision suffixes
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Structured error types with full context
//! - Per-record failure isolation: one failed PDF never aborts the run

mod client;
mod error;
mod fetcher;
mod filename;
pub mod rate_limit;

pub use client::HttpClient;
pub use error::DownloadError;
pub use fetcher::{DEFAULT_CONCURRENCY, FetchError, FetchStats, PdfFetcher};
pub use filename::{build_citation_filename, safe_filename};
pub use rate_limit::RateLimiter;
