//! Deterministic filename derivation and unique path resolution for PDFs.
//!
//! Filenames come from the citation record itself, never from response
//! headers: the same record always maps to the same preferred name, and
//! collisions on disk are resolved with numeric suffixes.

use std::path::{Component, Path};

/// Builds the preferred PDF filename for a citation record.
///
/// Pattern with complete metadata: `Author_Year_Title.pdf`
/// Degrades gracefully when fields are missing; an entirely blank record
/// falls back to `citation.pdf`.
#[must_use]
pub fn build_citation_filename(title: &str, authors: &str, year: Option<u16>) -> String {
    let author = extract_primary_author(authors);
    let title = {
        let cleaned = sanitize_filename_component(title);
        if cleaned.is_empty() {
            None
        } else {
            let truncated: String = cleaned.chars().take(60).collect();
            Some(truncated)
        }
    };

    let stem = match (author, year, title) {
        (Some(author), Some(year), Some(title)) => format!("{author}_{year}_{title}"),
        (Some(author), None, Some(title)) => format!("{author}_{title}"),
        (None, Some(year), Some(title)) => format!("{title}_{year}"),
        (_, _, Some(title)) => title,
        _ => "citation".to_string(),
    };

    format!("{stem}.pdf")
}

/// Extracts the primary author's family name from a semicolon-separated list.
pub(crate) fn extract_primary_author(authors: &str) -> Option<String> {
    let first = authors.split(';').next().map_or("", str::trim);
    if first.is_empty() {
        return None;
    }
    // "Family, Given" → family; "Given Family" → last word.
    let family = if first.contains(',') {
        first.split(',').next().map_or("", str::trim)
    } else {
        first.split_whitespace().next_back().unwrap_or(first)
    };
    let normalized = sanitize_filename_component(family);
    (!normalized.is_empty()).then_some(normalized)
}

/// Sanitizes a single metadata value into a filename component.
pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches('_').to_string()
}

/// Sanitizes a full filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Sanitizes a preferred name into a safe base filename.
///
/// Ensures no path separators remain (defense in depth against path
/// traversal); an unusable name falls back to `citation.pdf`.
#[must_use]
pub fn safe_filename(filename: &str) -> String {
    let sanitized = sanitize_filename(filename);
    if sanitized.contains('/')
        || sanitized.contains('\\')
        || sanitized.trim_matches('_').is_empty()
    {
        "citation.pdf".to_string()
    } else {
        sanitized
    }
}

/// The nth disambiguated variant of a filename: `stem_n.ext`.
///
/// Collision suffixes are what let concurrent downloads share one
/// destination directory; the actual claim on a name happens with an
/// atomic create-if-absent open in the download client.
#[must_use]
pub fn numbered_filename(filename: &str, n: usize) -> String {
    match filename.rfind('.') {
        Some(pos) => format!("{}_{n}{}", &filename[..pos], &filename[pos..]),
        None => format!("{filename}_{n}"),
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
