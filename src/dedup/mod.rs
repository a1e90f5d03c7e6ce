//! Dedup key derivation for candidate citations.
//!
//! Two works are considered the same when their keys match. A key is the
//! candidate's normalized persistent identifier (DOI) when it carries a
//! well-formed one, otherwise its normalized title. Derivation is pure and
//! deterministic: the same candidate always yields the same key.

mod persist;

pub use persist::SeenFile;

use crate::citation::Candidate;

/// Normalizes a DOI into its dedup-key form.
///
/// Strips URL prefixes (`https://doi.org/`, `https://dx.doi.org/`) and the
/// `doi:` label, URL-decodes, trims whitespace, then validates the shape:
/// must start with `10.` and carry a non-empty suffix after `/`. The result
/// is ASCII-lowercased so that `10.1/ABC` and `10.1/abc` collide.
///
/// The check is shape-only (no registrant-length rule): the value arrives in
/// a structured identifier field, not free text, so the stricter heuristics
/// used when mining DOIs out of prose would only reject real keys here.
///
/// Returns `None` when the input does not look like a DOI at all; malformed
/// decoration must not mint a bogus identifier key.
#[must_use]
pub fn normalize_doi(input: &str) -> Option<String> {
    let mut doi = input.trim();

    // Strip URL prefixes
    for prefix in &[
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
    ] {
        if let Some(stripped) = doi.strip_prefix(prefix) {
            doi = stripped;
            break;
        }
    }

    // Strip doi: prefix (case-insensitive)
    if doi.len() >= 4 && doi[..4].eq_ignore_ascii_case("doi:") {
        doi = doi[4..].trim_start();
    }

    // URL-decode
    let decoded = match urlencoding::decode(doi) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => doi.trim().to_string(),
    };

    validate_doi(&decoded).then(|| decoded.to_ascii_lowercase())
}

/// Validates DOI shape: `10.` + registrant + `/` + non-empty suffix.
fn validate_doi(doi: &str) -> bool {
    if !doi.starts_with("10.") {
        return false;
    }

    let Some(slash_pos) = doi.find('/') else {
        return false;
    };

    // Registrant and suffix must both be non-empty
    !doi[3..slash_pos].is_empty() && !doi[slash_pos + 1..].is_empty()
}

/// Normalizes a title into its dedup-key form.
///
/// Case-folds, replaces punctuation with spaces, and collapses whitespace
/// runs, so `"  Deep   Learning Review "` and `"deep learning review"` yield
/// the same key.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            out.push(ch);
            pending_space = false;
        } else {
            pending_space = true;
        }
    }

    out
}

/// Derives the dedup key for a candidate.
///
/// Prefers the persistent identifier; falls back to the normalized title.
/// The title fallback can reject distinct works sharing a title - that
/// precision/recall tradeoff is intentional and preserved as observed.
///
/// An empty key (no DOI, blank title) means the candidate is not
/// identifiable; callers skip such candidates.
#[must_use]
pub fn derive_key(candidate: &Candidate) -> String {
    if let Some(raw_doi) = &candidate.doi
        && let Some(key) = normalize_doi(raw_doi)
    {
        return key;
    }
    normalize_title(&candidate.title)
}
