//! Configuration lifecycle: load the TOML file, merge CLI overrides,
//! validate once at startup.
//!
//! The pipeline receives the validated [`Config`] by value and never
//! re-reads configuration mid-run.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::download::DEFAULT_CONCURRENCY;

/// Default number of results requested per term (the Scholar engine caps at 20).
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Maximum results per term accepted by the search engine.
pub const MAX_RESULT_LIMIT: usize = 20;

/// Default minimum delay between downloads hitting the same host.
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is missing from both the file and the CLI.
    #[error("missing required configuration: {field}")]
    Missing {
        /// The missing field name.
        field: &'static str,
    },

    /// A field value is out of range or otherwise unusable.
    #[error("invalid configuration for {field}: {reason}")]
    Invalid {
        /// The offending field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The config file (or a configured path) could not be read or created.
    #[error("IO error for {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// Raw, unvalidated configuration as read from `citesync.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// SerpAPI key for the search service.
    pub serp_api_key: Option<String>,
    /// Zotero user/library id.
    pub zotero_library_id: Option<String>,
    /// Zotero API key (needs write permission).
    pub zotero_api_key: Option<String>,
    /// Destination directory for downloaded PDFs.
    pub download_dir: Option<PathBuf>,
    /// Whether to download PDFs at all.
    pub enable_pdf_download: Option<bool>,
    /// Oldest publication year to search from.
    pub min_year: Option<u16>,
    /// Results requested per term (1-20).
    pub result_limit: Option<usize>,
    /// Concurrent PDF downloads (1-100).
    pub concurrency: Option<usize>,
    /// Minimum delay between downloads to one host, in milliseconds (0 disables).
    pub rate_limit_ms: Option<u64>,
    /// Cross-run dedup seen-file; unset means per-run memory only.
    pub seen_file: Option<PathBuf>,
}

impl FileConfig {
    /// Loads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads the file when it exists, otherwise returns an empty config so
    /// CLI-provided values can still satisfy validation.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`FileConfig::load`] for an existing file.
    pub fn load_if_present(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// CLI-sourced overrides applied on top of the file config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Overrides `download_dir`.
    pub download_dir: Option<PathBuf>,
    /// Forces PDF downloading off (`--no-pdf`).
    pub disable_pdf_download: bool,
    /// Overrides `min_year`.
    pub min_year: Option<u16>,
    /// Overrides `result_limit`.
    pub result_limit: Option<usize>,
    /// Overrides `concurrency`.
    pub concurrency: Option<usize>,
    /// Overrides `seen_file`.
    pub seen_file: Option<PathBuf>,
}

/// Validated configuration consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// SerpAPI key for the search service.
    pub serp_api_key: String,
    /// Zotero user/library id.
    pub zotero_library_id: String,
    /// Zotero API key.
    pub zotero_api_key: String,
    /// Destination directory for downloaded PDFs.
    pub download_dir: PathBuf,
    /// Whether to download PDFs.
    pub enable_pdf_download: bool,
    /// Oldest publication year to search from.
    pub min_year: Option<u16>,
    /// Results requested per term.
    pub result_limit: usize,
    /// Concurrent PDF downloads.
    pub concurrency: usize,
    /// Per-host download spacing in milliseconds.
    pub rate_limit_ms: u64,
    /// Cross-run dedup seen-file, when enabled.
    pub seen_file: Option<PathBuf>,
}

impl Config {
    /// Merges file values with CLI overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for absent credentials and
    /// [`ConfigError::Invalid`] for out-of-range numeric settings.
    pub fn resolve(file: FileConfig, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let serp_api_key = non_empty(file.serp_api_key, "serp_api_key")?;
        let zotero_library_id = non_empty(file.zotero_library_id, "zotero_library_id")?;
        let zotero_api_key = non_empty(file.zotero_api_key, "zotero_api_key")?;

        let download_dir = overrides
            .download_dir
            .clone()
            .or(file.download_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let enable_pdf_download = if overrides.disable_pdf_download {
            false
        } else {
            file.enable_pdf_download.unwrap_or(true)
        };

        let result_limit = overrides
            .result_limit
            .or(file.result_limit)
            .unwrap_or(DEFAULT_RESULT_LIMIT);
        if !(1..=MAX_RESULT_LIMIT).contains(&result_limit) {
            return Err(ConfigError::Invalid {
                field: "result_limit",
                reason: format!("{result_limit} is outside 1-{MAX_RESULT_LIMIT}"),
            });
        }

        let concurrency = overrides
            .concurrency
            .or(file.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if !(1..=100).contains(&concurrency) {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                reason: format!("{concurrency} is outside 1-100"),
            });
        }

        Ok(Self {
            serp_api_key,
            zotero_library_id,
            zotero_api_key,
            download_dir,
            enable_pdf_download,
            min_year: overrides.min_year.or(file.min_year),
            result_limit,
            concurrency,
            rate_limit_ms: file.rate_limit_ms.unwrap_or(DEFAULT_RATE_LIMIT_MS),
            seen_file: overrides.seen_file.clone().or(file.seen_file),
        })
    }
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { field }),
    }
}
