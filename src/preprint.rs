//! arXiv identifier recognition and canonical PDF URL resolution.
//!
//! Preprint-server items never download from the generic search-result link;
//! their identifier resolves deterministically to the canonical PDF URL.
//! Recognition covers bare identifiers, `arxiv.org/abs/…` and
//! `arxiv.org/pdf/….pdf` links, and the `10.48550/arXiv.…` DOI form.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

const ARXIV_BASE_URL: &str = "https://arxiv.org";
const ARXIV_HOST: &str = "arxiv.org";
const DOI_HOST: &str = "doi.org";
const ARXIV_DOI_PREFIX: &str = "10.48550/";

/// New-style (`2301.00001`, optional `vN`) and old-style
/// (`hep-th/9901001`) identifier shapes.
#[allow(clippy::expect_used)]
static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\d{4}\.\d{4,5}|[a-z\-]+(?:\.[a-z]{2})?/\d{7})(?:v\d+)?$")
        .expect("arXiv id regex is valid") // Static pattern, safe to panic
});

/// Validates and canonicalizes a bare arXiv identifier.
#[must_use]
pub fn normalize_id(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim().trim_matches('/');
    ARXIV_ID_RE.is_match(trimmed).then(|| trimmed.to_string())
}

/// Extracts an arXiv identifier from a search-result link.
///
/// Handles `arxiv.org/abs/<id>`, `arxiv.org/pdf/<id>.pdf`, and
/// `doi.org/10.48550/arXiv.<id>` URL forms. Returns `None` for anything else.
#[must_use]
pub fn extract_from_link(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?.strip_prefix("www.").unwrap_or(parsed.host_str()?);
    let path = parsed.path().trim();

    if host == ARXIV_HOST {
        if let Some(id) = path.strip_prefix("/abs/") {
            return normalize_id(id);
        }
        if let Some(id) = path.strip_prefix("/pdf/") {
            return normalize_id(id.strip_suffix(".pdf").unwrap_or(id));
        }
        return None;
    }

    if host == DOI_HOST {
        return extract_from_doi(path.trim_start_matches('/'));
    }

    None
}

/// Extracts an arXiv identifier from a `10.48550/arXiv.<id>` DOI string.
#[must_use]
pub fn extract_from_doi(doi: &str) -> Option<String> {
    let trimmed = doi.trim();
    if !trimmed
        .to_ascii_lowercase()
        .starts_with(ARXIV_DOI_PREFIX)
    {
        return None;
    }

    let suffix = &trimmed[ARXIV_DOI_PREFIX.len()..];
    let id_candidate = if suffix.to_ascii_lowercase().starts_with("arxiv.") {
        &suffix["arxiv.".len()..]
    } else {
        suffix
    };

    normalize_id(id_candidate)
}

/// Canonical PDF URL for a (validated) arXiv identifier.
#[must_use]
pub fn pdf_url(id: &str) -> String {
    format!("{ARXIV_BASE_URL}/pdf/{id}.pdf")
}

/// The DataCite DOI arXiv mints for every preprint.
#[must_use]
pub fn arxiv_doi(id: &str) -> String {
    format!("10.48550/arXiv.{id}")
}
