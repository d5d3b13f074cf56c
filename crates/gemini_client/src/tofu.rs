use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use crate::error::{GeminiClientError, Result};

const KEY_TYPE: &str = "ssh-ed25519";

/// Outcome of checking a presented key against the known-capsules store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TofuLookup {
    /// An entry for this host exists and matches the presented key.
    Match,
    /// No entry for this host exists; first-use pinning is eligible.
    AbsentWithNoneWanted,
    /// An entry for this host exists but names a different key — a pinning
    /// violation, treated by callers as a hard reject.
    AbsentWithWanted,
}

/// A known_hosts-formatted, append-only trust store for Gemini capsules.
///
/// Each line is `host:port ssh-ed25519 <base64>`.
pub struct TofuStore {
    path: PathBuf,
}

impl TofuStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up `host_port` against the stored entries.
    pub fn lookup(&self, host_port: &str, pinned_key: &str) -> Result<TofuLookup> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TofuLookup::AbsentWithNoneWanted);
            }
            Err(e) => return Err(GeminiClientError::Io(e)),
        };

        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let entry_host = fields.next().unwrap_or("");
            if entry_host != host_port {
                continue;
            }
            let entry_type = fields.next().unwrap_or("");
            let entry_key = fields.next().unwrap_or("");
            if entry_type == KEY_TYPE && entry_key == pinned_key {
                return Ok(TofuLookup::Match);
            }
            return Ok(TofuLookup::AbsentWithWanted);
        }

        Ok(TofuLookup::AbsentWithNoneWanted)
    }

    /// Appends one known_hosts-formatted line. Creates the file owner-only
    /// if it doesn't exist yet.
    pub fn append(&self, host_port: &str, pinned_key: &str) -> Result<()> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path)?;
        writeln!(file, "{host_port} {KEY_TYPE} {pinned_key}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lookup_on_missing_file_is_absent_none_wanted() {
        let dir = tempdir().unwrap();
        let store = TofuStore::new(dir.path().join("known_hosts"));
        assert_eq!(
            store.lookup("example.org:1965", "AAAA").unwrap(),
            TofuLookup::AbsentWithNoneWanted
        );
    }

    #[test]
    fn append_then_lookup_matches() {
        let dir = tempdir().unwrap();
        let store = TofuStore::new(dir.path().join("known_hosts"));
        store.append("example.org:1965", "AAAA").unwrap();
        assert_eq!(
            store.lookup("example.org:1965", "AAAA").unwrap(),
            TofuLookup::Match
        );
    }

    #[test]
    fn mismatched_key_is_absent_with_wanted() {
        let dir = tempdir().unwrap();
        let store = TofuStore::new(dir.path().join("known_hosts"));
        store.append("example.org:1965", "AAAA").unwrap();
        assert_eq!(
            store.lookup("example.org:1965", "BBBB").unwrap(),
            TofuLookup::AbsentWithWanted
        );
    }

    #[test]
    fn unlisted_host_is_absent_none_wanted_even_with_other_entries() {
        let dir = tempdir().unwrap();
        let store = TofuStore::new(dir.path().join("known_hosts"));
        store.append("other.example:1965", "AAAA").unwrap();
        assert_eq!(
            store.lookup("example.org:1965", "BBBB").unwrap(),
            TofuLookup::AbsentWithNoneWanted
        );
    }

    #[test]
    fn append_is_append_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        let store = TofuStore::new(&path);
        store.append("a.example:1965", "AAAA").unwrap();
        let first_line = std::fs::read_to_string(&path).unwrap();
        store.append("b.example:1965", "BBBB").unwrap();
        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.starts_with(&first_line));
        assert!(after.contains("b.example:1965"));
    }
}
