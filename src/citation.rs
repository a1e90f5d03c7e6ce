//! Citation model types: raw search candidates, accepted records, and status enums.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::preprint;

/// PDF acquisition status for a citation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfStatus {
    /// No download was requested for this record.
    NotRequested,
    /// A download task has been dispatched.
    Pending,
    /// The PDF was written to the destination directory.
    Downloaded,
    /// The download failed (network, HTTP status, or filesystem).
    Failed,
}

impl PdfStatus {
    /// Returns the string representation used in logs and summaries.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequested => "not_requested",
            Self::Pending => "pending",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PdfStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PdfStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_requested" => Ok(Self::NotRequested),
            "pending" => Ok(Self::Pending),
            "downloaded" => Ok(Self::Downloaded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid pdf status: {s}")),
        }
    }
}

/// Upload status for a citation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Waiting for the upload stage.
    Pending,
    /// The citation store accepted the item (and attachment, when present).
    Uploaded,
    /// The citation-store call failed; the reason is recorded on the record.
    Failed,
}

impl UploadStatus {
    /// Returns the string representation used in logs and summaries.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "uploaded" => Ok(Self::Uploaded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid upload status: {s}")),
        }
    }
}

/// A raw citation as returned by the search service, prior to dedup acceptance.
///
/// Candidates are produced in the order the search service returned them;
/// that order is what makes dedup order-stable within a term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    /// Work title as reported by the search service.
    pub title: String,
    /// Author names, semicolon-separated.
    pub authors: String,
    /// Publication year when the service reported one.
    pub year: Option<u16>,
    /// Raw DOI string, possibly decorated (URL prefix, `doi:` label).
    pub doi: Option<String>,
    /// arXiv identifier when the result links to a preprint.
    pub arxiv_id: Option<String>,
    /// Direct PDF or landing-page link from the search result.
    pub source_link: Option<String>,
}

/// One accepted work in the citation registry.
///
/// Created exactly once per dedup key and updated in place as the PDF
/// acquisition and upload stages progress. The two status axes are
/// independent: a failed download never blocks a metadata-only upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationRecord {
    /// Uniqueness invariant: normalized DOI, else normalized title.
    pub dedup_key: String,
    /// Work title, display-only.
    pub title: String,
    /// Author names, semicolon-separated, display-only.
    pub authors: String,
    /// Publication year, display-only.
    pub year: Option<u16>,
    /// Normalized-enough DOI carried for the upload payload.
    pub doi: Option<String>,
    /// arXiv identifier; presence selects the canonical-PDF download path.
    pub arxiv_id: Option<String>,
    /// PDF or landing-page link from the search result.
    pub source_link: Option<String>,
    /// PDF acquisition state.
    pub pdf_status: PdfStatus,
    /// Local path of the downloaded PDF, set iff `pdf_status == Downloaded`.
    pub pdf_path: Option<PathBuf>,
    /// Upload state.
    pub upload_status: UploadStatus,
    /// Failure reason recorded when `upload_status == Failed`.
    pub upload_error: Option<String>,
}

impl CitationRecord {
    /// Creates a freshly accepted record from a candidate.
    ///
    /// New records start with `pdf_status = not_requested` and
    /// `upload_status = pending`, per the pipeline state machine.
    #[must_use]
    pub fn accepted(dedup_key: String, candidate: &Candidate) -> Self {
        Self {
            dedup_key,
            title: candidate.title.clone(),
            authors: candidate.authors.clone(),
            year: candidate.year,
            doi: candidate.doi.clone(),
            arxiv_id: candidate.arxiv_id.clone(),
            source_link: candidate.source_link.clone(),
            pdf_status: PdfStatus::NotRequested,
            pdf_path: None,
            upload_status: UploadStatus::Pending,
            upload_error: None,
        }
    }

    /// Returns the URL a download task should fetch, if any.
    ///
    /// Preprint-server records always resolve to the canonical arXiv PDF URL,
    /// never the generic result link; everything else uses `source_link`.
    #[must_use]
    pub fn download_url(&self) -> Option<String> {
        if let Some(id) = &self.arxiv_id {
            return Some(preprint::pdf_url(id));
        }
        self.source_link.clone()
    }
}

impl fmt::Display for CitationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CitationRecord {{ key: {}, pdf: {}, upload: {} }}",
            self.dedup_key, self.pdf_status, self.upload_status
        )
    }
}
