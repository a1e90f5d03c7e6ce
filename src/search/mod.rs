//! Search-service clients producing ordered candidate citations.
//!
//! The pipeline talks to a [`SearchProvider`] trait object rather than a
//! concrete client, so integration tests and future index backends can slot
//! in without touching the pipeline.
//!
//! # Object Safety
//!
//! The trait uses `async_trait` to support dynamic dispatch via
//! `Box<dyn SearchProvider>`. Rust 2024 native async traits are not
//! object-safe, so `async_trait` is required for this seam.

mod serpapi;

pub use serpapi::SerpApiClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::citation::Candidate;

/// Errors from a search-service call.
///
/// A search failure is recoverable at the run level: the current term is
/// skipped and the pipeline continues with the next one.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Network-level error (DNS, connection refused, TLS, etc.)
    #[error("network error searching for {term:?}: {source}")]
    Network {
        /// The search term that failed.
        term: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout searching for {term:?}")]
    Timeout {
        /// The search term that timed out.
        term: String,
    },

    /// The service rejected the credentials.
    #[error("search service rejected credentials (HTTP {status})")]
    Auth {
        /// The HTTP status code (401 or 403).
        status: u16,
    },

    /// The service throttled the request.
    #[error("search service rate limit exceeded (HTTP 429)")]
    RateLimited,

    /// Any other HTTP error response.
    #[error("search service returned HTTP {status} for {term:?}")]
    HttpStatus {
        /// The search term that failed.
        term: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be interpreted.
    #[error("malformed search response for {term:?}: {reason}")]
    Malformed {
        /// The search term whose response failed to parse.
        term: String,
        /// What went wrong while decoding.
        reason: String,
    },
}

impl SearchError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn request(term: impl Into<String>, source: reqwest::Error) -> Self {
        let term = term.into();
        if source.is_timeout() {
            Self::Timeout { term }
        } else {
            Self::Network { term, source }
        }
    }

    /// Creates the appropriate error for a non-success HTTP status.
    pub fn from_status(term: impl Into<String>, status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            429 => Self::RateLimited,
            _ => Self::HttpStatus {
                term: term.into(),
                status,
            },
        }
    }
}

/// A search backend that turns one term into an ordered candidate sequence.
///
/// Implementations must preserve the order the service returned results in;
/// dedup is order-stable, not score-stable.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns the provider's name (e.g., "serpapi").
    fn name(&self) -> &str;

    /// Runs one query and returns the candidates in service order.
    async fn search(
        &self,
        term: &str,
        min_year: Option<u16>,
    ) -> Result<Vec<Candidate>, SearchError>;
}
