//! SerpAPI Google Scholar client.
//!
//! One request per search term against the `google_scholar` engine; the
//! JSON `organic_results` array maps to [`Candidate`] records in service
//! order. Identifiers are recovered from result links where possible: a
//! `doi.org` link yields a DOI, an `arxiv.org` link yields a preprint
//! identifier.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{SearchError, SearchProvider};
use crate::citation::Candidate;
use crate::preprint;

/// Production endpoint; overridable for tests.
const DEFAULT_BASE_URL: &str = "https://serpapi.com";

/// Connect timeout for search calls.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for search calls.
const READ_TIMEOUT_SECS: u64 = 60;

/// Four-digit publication year embedded in the publication summary string.
#[allow(clippy::expect_used)]
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:19|20)\d{2}\b").expect("year regex is valid") // Static pattern, safe to panic
});

/// SerpAPI Google Scholar search client.
///
/// Designed to be created once per run and reused across terms, taking
/// advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct SerpApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    result_limit: usize,
}

impl SerpApiClient {
    /// Creates a client against the production SerpAPI endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new(api_key: impl Into<String>, result_limit: usize) -> Self {
        Self::with_base_url(api_key, result_limit, DEFAULT_BASE_URL)
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
        api_key: impl Into<String>,
        result_limit: usize,
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
            api_key: api_key.into(),
            result_limit,
        }
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    #[instrument(skip(self), fields(provider = "serpapi"))]
    async fn search(
        &self,
        term: &str,
        min_year: Option<u16>,
    ) -> Result<Vec<Candidate>, SearchError> {
        let url = format!("{}/search.json", self.base_url);
        let limit = self.result_limit.to_string();
        let mut request = self.client.get(&url).query(&[
            ("engine", "google_scholar"),
            ("q", term),
            ("num", limit.as_str()),
            ("api_key", self.api_key.as_str()),
        ]);
        if let Some(year) = min_year {
            request = request.query(&[("as_ylo", year.to_string().as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::request(term, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::from_status(term, status.as_u16()));
        }

        let body: ScholarResponse =
            response
                .json()
                .await
                .map_err(|e| SearchError::Malformed {
                    term: term.to_string(),
                    reason: e.to_string(),
                })?;

        if let Some(error) = &body.error {
            // SerpAPI reports "no results" style conditions in-band with 200.
            warn!(term, error = %error, "search service reported an in-band error");
        }

        let candidates: Vec<Candidate> = body
            .organic_results
            .into_iter()
            .map(candidate_from_result)
            .collect();

        debug!(term, count = candidates.len(), "search complete");
        Ok(candidates)
    }
}

/// SerpAPI Google Scholar response envelope (fields we consume).
#[derive(Debug, Deserialize)]
struct ScholarResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    publication_info: Option<PublicationInfo>,
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicationInfo {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    authors: Vec<PublicationAuthor>,
}

#[derive(Debug, Deserialize)]
struct PublicationAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(default)]
    file_format: Option<String>,
    link: String,
}

/// Maps one organic result to a candidate, preserving nothing but what the
/// dedup/acquisition/upload stages actually consume.
fn candidate_from_result(result: OrganicResult) -> Candidate {
    let publication = result.publication_info.unwrap_or_default();

    let authors = if publication.authors.is_empty() {
        // Summary format: "A Author, B Author - Journal, 2020 - host.com"
        publication
            .summary
            .as_deref()
            .and_then(|s| s.split(" - ").next())
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default()
    } else {
        publication
            .authors
            .iter()
            .map(|a| a.name.trim())
            .collect::<Vec<_>>()
            .join("; ")
    };

    let year = publication
        .summary
        .as_deref()
        .and_then(|s| YEAR_RE.find(s))
        .and_then(|m| m.as_str().parse::<u16>().ok());

    let source_link = result
        .resources
        .iter()
        .find(|r| r.file_format.as_deref() == Some("PDF"))
        .map(|r| r.link.clone());

    // Identifier recovery: the result link first, then the PDF resource link.
    let links = result.link.iter().chain(source_link.iter());
    let mut doi = None;
    let mut arxiv_id = None;
    for link in links {
        if arxiv_id.is_none() {
            arxiv_id = preprint::extract_from_link(link);
        }
        if doi.is_none() {
            doi = doi_from_link(link);
        }
    }

    Candidate {
        title: result.title.trim().to_string(),
        authors,
        year,
        doi,
        arxiv_id,
        source_link,
    }
}

/// Pulls the raw DOI out of a `doi.org` link, if that is what the link is.
fn doi_from_link(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    if host != "doi.org" && host != "dx.doi.org" && host != "www.doi.org" {
        return None;
    }
    let path = parsed.path().trim_start_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}
