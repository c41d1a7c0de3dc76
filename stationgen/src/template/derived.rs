//! Persistent cache of data derived from templates.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::ledger::Ledger;

/// Cached derived data of one template.
///
/// An entry is only used if its [`content_hash`](Self::content_hash) equals the hash of the
/// template's current authoring data and block registry; otherwise it is silently
/// recomputed and rewritten.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct DerivedRecord {
    /// Format version; entries of other versions are discarded.
    pub format: u32,
    /// Hex content hash of the inputs this was derived from.
    pub content_hash: String,
    /// Bounding box of occupied cells, `[lower, upper]`.
    pub block_box: [[i32; 3]; 2],
    /// Aggregate statistics of the template's blocks.
    pub ledger: Ledger,
}

impl DerivedRecord {
    /// Current value of [`Self::format`].
    pub const FORMAT: u32 = 1;

    pub(crate) fn new(content_hash: String, block_box: [[i32; 3]; 2], ledger: Ledger) -> Self {
        Self {
            format: Self::FORMAT,
            content_hash,
            block_box,
            ledger,
        }
    }
}

/// Storage for [`DerivedRecord`]s, addressed by template name.
///
/// Implementations must not fail loudly: a record which cannot be read is reported as
/// absent, and a record which cannot be written is dropped with a log message.
pub trait DerivedCache: fmt::Debug + Send + Sync {
    /// Returns the stored record for `name`, if any can be read.
    fn load(&self, name: &str) -> Option<DerivedRecord>;

    /// Stores a record for `name`. May complete asynchronously.
    fn store(&self, name: &str, record: DerivedRecord);
}

/// [`DerivedCache`] which holds records in memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    records: Mutex<HashMap<String, DerivedRecord>>,
}

impl MemoryCache {
    /// Constructs an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DerivedCache for MemoryCache {
    fn load(&self, name: &str) -> Option<DerivedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn store(&self, name: &str, record: DerivedRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), record);
    }
}

/// [`DerivedCache`] which stores one JSON file per template in a directory.
///
/// Writes happen on background threads; call [`DirectoryCache::flush()`] to wait for them.
#[derive(Debug)]
pub struct DirectoryCache {
    directory: PathBuf,
    writers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl DirectoryCache {
    /// Uses `directory`, which will be created when first written to.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            writers: Mutex::new(Vec::new()),
        }
    }

    /// Path of the file holding the record for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{file_name}.json"))
    }

    /// Waits for all pending writes to finish.
    pub fn flush(&self) {
        let writers = std::mem::take(&mut *self.writers.lock().unwrap_or_else(PoisonError::into_inner));
        for writer in writers {
            Self::join(writer);
        }
    }

    fn join(writer: thread::JoinHandle<()>) {
        if writer.join().is_err() {
            log::warn!("derived cache writer thread panicked");
        }
    }

    fn write(path: &Path, record: &DerivedRecord) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Readers never observe a partially written file.
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&temp, path)
    }
}

impl DerivedCache for DirectoryCache {
    fn load(&self, name: &str) -> Option<DerivedRecord> {
        let path = self.path_for(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::debug!("could not read derived cache {path}: {e}", path = path.display());
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                log::debug!(
                    "discarding malformed derived cache {path}: {e}",
                    path = path.display()
                );
                None
            }
        }
    }

    fn store(&self, name: &str, record: DerivedRecord) {
        let path = self.path_for(name);
        let spawned = thread::Builder::new()
            .name("stationgen-cache-writer".into())
            .spawn(move || {
                if let Err(e) = Self::write(&path, &record) {
                    log::warn!("failed to write derived cache {path}: {e}", path = path.display());
                }
            });
        match spawned {
            Ok(handle) => {
                let mut writers = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
                for finished in writers.extract_if(.., |w| w.is_finished()) {
                    Self::join(finished);
                }
                writers.push(handle);
            }
            Err(e) => log::warn!("failed to start derived cache writer: {e}"),
        }
    }
}

impl Drop for DirectoryCache {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> DerivedRecord {
        DerivedRecord::new("abc".into(), [[0, 0, 0], [1, 2, 3]], Ledger::new())
    }

    #[test]
    fn directory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::new(dir.path().join("nested"));
        assert_eq!(cache.load("hab/a"), None);
        cache.store("hab/a", record());
        cache.flush();
        assert_eq!(cache.load("hab/a"), Some(record()));
        assert!(cache.path_for("hab/a").ends_with("hab_a.json"));
    }

    #[test]
    fn finished_writers_are_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::new(dir.path());
        let pending = || cache.writers.lock().unwrap().len();
        for i in 0..20 {
            cache.store(&format!("t{i}"), record());
            while !cache.writers.lock().unwrap().iter().all(|w| w.is_finished()) {
                thread::yield_now();
            }
        }
        // Only the most recent write can still be held.
        assert_eq!(pending(), 1);
        cache.flush();
        assert_eq!(pending(), 0);
        assert_eq!(cache.load("t19"), Some(record()));
    }

    #[test]
    fn malformed_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::new(dir.path());
        fs::write(cache.path_for("x"), b"{ not json").unwrap();
        assert_eq!(cache.load("x"), None);
    }

    #[test]
    fn memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache.store("a", record());
        assert_eq!(cache.load("a"), Some(record()));
        assert_eq!(cache.len(), 1);
    }
}
