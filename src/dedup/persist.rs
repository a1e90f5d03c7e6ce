//! Optional cross-run persistence for the dedup seen-set.
//!
//! The on-disk representation is a plain set of key strings, one per line:
//! loaded once at startup, appended on every accept, never rewritten or
//! pruned during a run. Whether a run uses a seen-file at all is an explicit
//! configuration choice; the default is per-run memory only.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Append-only file of accepted dedup keys.
#[derive(Debug)]
pub struct SeenFile {
    path: PathBuf,
}

impl SeenFile {
    /// Opens (creating if absent) the seen-file and loads its keys.
    ///
    /// Blank lines are ignored, so a file that ends with a trailing newline
    /// round-trips cleanly.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the file cannot be created or read.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<String>)> {
        if !path.exists() {
            File::create(path)?;
        }

        let reader = BufReader::new(File::open(path)?);
        let mut keys = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                keys.push(trimmed.to_string());
            }
        }

        debug!(path = %path.display(), keys = keys.len(), "loaded dedup seen-file");

        Ok((
            Self {
                path: path.to_path_buf(),
            },
            keys,
        ))
    }

    /// Appends one accepted key.
    ///
    /// Called from the sequential dedup step only, after the in-memory
    /// check-and-set accepted the key, so appends happen at most once per key
    /// per run.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the file cannot be opened or written.
    pub fn append(&self, key: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{key}")
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_missing_file_with_no_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seen.txt");

        let (seen, keys) = SeenFile::open(&path).unwrap();
        assert!(keys.is_empty());
        assert!(path.exists());
        assert_eq!(seen.path(), path);
    }

    #[test]
    fn test_open_loads_existing_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seen.txt");
        std::fs::write(&path, "10.1234/example\ndeep learning review\n").unwrap();

        let (_seen, keys) = SeenFile::open(&path).unwrap();
        assert_eq!(keys, vec!["10.1234/example", "deep learning review"]);
    }

    #[test]
    fn test_open_skips_blank_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seen.txt");
        std::fs::write(&path, "10.1234/a\n\n  \n10.1234/b\n").unwrap();

        let (_seen, keys) = SeenFile::open(&path).unwrap();
        assert_eq!(keys, vec!["10.1234/a", "10.1234/b"]);
    }

    #[test]
    fn test_append_then_reload_roundtrips() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seen.txt");

        let (seen, _) = SeenFile::open(&path).unwrap();
        seen.append("10.1234/first").unwrap();
        seen.append("second title key").unwrap();

        let (_seen, keys) = SeenFile::open(&path).unwrap();
        assert_eq!(keys, vec!["10.1234/first", "second title key"]);
    }

    #[test]
    fn test_append_preserves_existing_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seen.txt");
        std::fs::write(&path, "10.1234/old\n").unwrap();

        let (seen, keys) = SeenFile::open(&path).unwrap();
        assert_eq!(keys.len(), 1);
        seen.append("10.1234/new").unwrap();

        let (_seen, keys) = SeenFile::open(&path).unwrap();
        assert_eq!(keys, vec!["10.1234/old", "10.1234/new"]);
    }
}
