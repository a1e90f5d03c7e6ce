//! Shared citation registry: the dedup set plus the key → record map.
//!
//! One mutex guards both structures, so the dedup check-and-set and every
//! status transition are atomic with respect to concurrent PDF-download
//! tasks. Critical sections are limited to the in-memory mutation; network
//! and disk I/O always happen outside the lock.
//!
//! Entries are created once (on dedup acceptance), updated in place, and
//! never deleted during a run.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::citation::{Candidate, CitationRecord, PdfStatus, UploadStatus};

/// Outcome of offering a candidate to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The key was unseen; a record was created.
    Accepted(CitationRecord),
    /// The key was already present. An expected outcome, not an error.
    Duplicate,
}

impl AcceptOutcome {
    /// Returns true for the `Accepted` variant.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Aggregate per-run counts derived from the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryCounts {
    /// Records accepted into the registry.
    pub accepted: usize,
    /// Records with a successfully downloaded PDF.
    pub pdf_downloaded: usize,
    /// Records whose PDF download failed.
    pub pdf_failed: usize,
    /// Records uploaded to the citation store.
    pub uploaded: usize,
    /// Records whose upload failed.
    pub upload_failed: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Every key ever accepted (including seeded cross-run keys). Monotonic.
    seen: HashSet<String>,
    /// Accepted records by dedup key.
    records: HashMap<String, CitationRecord>,
    /// Keys in acceptance order, for stable iteration in summaries/uploads.
    order: Vec<String>,
}

/// Lock-protected mapping from dedup key to citation record.
///
/// Cheap to clone (`Arc` inside); clones share the same underlying state.
/// Any number of concurrent download tasks may update statuses, but each
/// mutation is atomic and the lock is never held across a suspension point.
#[derive(Debug, Clone, Default)]
pub struct CitationRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl CitationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose dedup set is pre-seeded with keys accepted in
    /// prior runs. Seeded keys gate acceptance but have no records.
    #[must_use]
    pub fn with_seen_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let registry = Self::new();
        {
            let mut inner = registry.lock();
            inner.seen.extend(keys);
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A poisoned lock means a panicking task died mid-mutation; all
        // mutations here are single field stores, so the state stays usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomic insert-if-absent: the dedup accept step.
    ///
    /// If `dedup_key` is unseen, marks it seen and creates a record with
    /// `pdf_status = not_requested`, `upload_status = pending`. Otherwise the
    /// candidate is a true duplicate and is discarded.
    #[must_use]
    pub fn accept(&self, dedup_key: String, candidate: &Candidate) -> AcceptOutcome {
        let mut inner = self.lock();
        if !inner.seen.insert(dedup_key.clone()) {
            trace!(key = %dedup_key, "duplicate candidate rejected");
            return AcceptOutcome::Duplicate;
        }

        let record = CitationRecord::accepted(dedup_key.clone(), candidate);
        inner.order.push(dedup_key.clone());
        inner.records.insert(dedup_key, record.clone());
        AcceptOutcome::Accepted(record)
    }

    /// Transitions a record's PDF status to `pending`.
    ///
    /// Returns false if the key is unknown.
    pub fn mark_pdf_pending(&self, dedup_key: &str) -> bool {
        let mut inner = self.lock();
        match inner.records.get_mut(dedup_key) {
            Some(record) => {
                record.pdf_status = PdfStatus::Pending;
                true
            }
            None => false,
        }
    }

    /// Records a completed download: `pdf_status = downloaded` plus the path.
    pub fn mark_pdf_downloaded(&self, dedup_key: &str, path: PathBuf) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(dedup_key) {
            record.pdf_status = PdfStatus::Downloaded;
            record.pdf_path = Some(path);
        }
    }

    /// Records a failed download. The failure stays on this record only.
    pub fn mark_pdf_failed(&self, dedup_key: &str) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(dedup_key) {
            record.pdf_status = PdfStatus::Failed;
        }
    }

    /// Marks a record as uploaded.
    pub fn mark_uploaded(&self, dedup_key: &str) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(dedup_key) {
            record.upload_status = UploadStatus::Uploaded;
            record.upload_error = None;
        }
    }

    /// Marks a record's upload as failed and records the reason.
    pub fn mark_upload_failed(&self, dedup_key: &str, reason: impl Into<String>) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(dedup_key) {
            record.upload_status = UploadStatus::Failed;
            record.upload_error = Some(reason.into());
        }
    }

    /// Returns a clone of the record for `dedup_key`, if present.
    #[must_use]
    pub fn get(&self, dedup_key: &str) -> Option<CitationRecord> {
        self.lock().records.get(dedup_key).cloned()
    }

    /// Returns clones of all records still awaiting upload, in acceptance order.
    #[must_use]
    pub fn pending_uploads(&self) -> Vec<CitationRecord> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|key| inner.records.get(key))
            .filter(|record| record.upload_status == UploadStatus::Pending)
            .cloned()
            .collect()
    }

    /// Returns clones of all records, in acceptance order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CitationRecord> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|key| inner.records.get(key))
            .cloned()
            .collect()
    }

    /// Number of accepted records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// True when no record has been accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Aggregates status counts across all records.
    #[must_use]
    pub fn counts(&self) -> RegistryCounts {
        let inner = self.lock();
        let mut counts = RegistryCounts {
            accepted: inner.records.len(),
            ..RegistryCounts::default()
        };
        for record in inner.records.values() {
            match record.pdf_status {
                PdfStatus::Downloaded => counts.pdf_downloaded += 1,
                PdfStatus::Failed => counts.pdf_failed += 1,
                PdfStatus::NotRequested | PdfStatus::Pending => {}
            }
            match record.upload_status {
                UploadStatus::Uploaded => counts.uploaded += 1,
                UploadStatus::Failed => counts.upload_failed += 1,
                UploadStatus::Pending => {}
            }
        }
        counts
    }
}
