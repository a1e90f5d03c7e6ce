//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

use citesync_core::ConfigOverrides;

/// Maximum number of search terms processed in one run.
pub const MAX_TERMS: usize = 20;

/// Minimum length of a usable search term.
const MIN_TERM_LEN: usize = 3;

/// Search scholarly indexes, dedupe the citations, and sync them to a
/// Zotero library.
///
/// Citesync runs one search per term, deduplicates the results against the
/// run's registry (and optionally a cross-run seen-file), downloads PDFs
/// where available, and uploads the new citations to your Zotero library.
#[derive(Parser, Debug)]
#[command(name = "citesync")]
#[command(author, version, about)]
pub struct Args {
    /// Search terms (use semicolons to separate multiple terms, max 20)
    pub terms: Vec<String>,

    /// Path to the config file (default: ./citesync.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Oldest publication year to search from
    #[arg(long, value_name = "YEAR")]
    pub min_year: Option<u16>,

    /// Destination directory for downloaded PDFs
    #[arg(short = 'd', long = "dest", value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Skip PDF downloads entirely (metadata-only uploads)
    #[arg(long)]
    pub no_pdf: bool,

    /// Maximum concurrent PDF downloads (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Results requested per term (1-20)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub limit: Option<u8>,

    /// Cross-run dedup file (one key per line); enables cross-run memory
    #[arg(long, value_name = "FILE")]
    pub seen_file: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Maps the CLI flags onto config-file overrides.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            download_dir: self.download_dir.clone(),
            disable_pdf_download: self.no_pdf,
            min_year: self.min_year,
            result_limit: self.limit.map(usize::from),
            concurrency: self.concurrency.map(usize::from),
            seen_file: self.seen_file.clone(),
        }
    }
}

/// Splits, trims, and bounds the raw term arguments.
///
/// Terms may arrive as separate arguments or semicolon-joined strings.
/// Terms shorter than 3 characters are rejected (they match everything on
/// Scholar), and runs are capped at 20 terms.
#[must_use]
pub fn collect_terms(raw: &[String]) -> Vec<String> {
    let mut terms = Vec::new();

    for term in raw.join(";").split(';').map(str::trim) {
        if term.is_empty() {
            continue;
        }
        if term.chars().count() < MIN_TERM_LEN {
            warn!(term, "search term shorter than 3 characters; skipping");
            continue;
        }
        if terms.len() == MAX_TERMS {
            warn!(term, "run is capped at 20 terms; dropping the rest");
            break;
        }
        terms.push(term.to_string());
    }

    terms
}
