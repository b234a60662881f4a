//! File-backed checkpoint store
//!
//! The snapshot is a pretty-printed JSON document replaced atomically on every
//! save; the entry log is a separate append-only file.

use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::{write_atomic, CrawlSnapshot, EntryLog, PageEntry};
use std::path::{Path, PathBuf};

/// Checkpoint store writing the snapshot and entry log to local files
#[derive(Debug)]
pub struct FileCheckpointStore {
    snapshot_path: PathBuf,
    entries: EntryLog,
}

impl FileCheckpointStore {
    /// Opens the store, creating or repairing the entry log as needed
    ///
    /// # Arguments
    ///
    /// * `snapshot_path` - Where the crawl snapshot lives
    /// * `entries_path` - Where page entries are appended
    pub fn open(snapshot_path: &Path, entries_path: &Path) -> StorageResult<Self> {
        let entries = EntryLog::open(entries_path)?;
        Ok(Self {
            snapshot_path: snapshot_path.to_path_buf(),
            entries,
        })
    }

    /// Removes any previous snapshot and entry log so a crawl starts fresh
    pub fn discard(snapshot_path: &Path, entries_path: &Path) -> StorageResult<()> {
        for path in [snapshot_path, entries_path] {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::info!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn entries_path(&self) -> &Path {
        self.entries.path()
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save_snapshot(&mut self, snapshot: &CrawlSnapshot) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.snapshot_path, &bytes)?;
        Ok(())
    }

    fn load_snapshot(&self) -> StorageResult<Option<CrawlSnapshot>> {
        load_snapshot_file(&self.snapshot_path)
    }

    fn append_entry(&mut self, entry: &PageEntry) -> StorageResult<()> {
        self.entries.append(entry)
    }
}

/// Reads a snapshot file without opening an entry log
///
/// Used by read-only tooling such as `--stats`.
pub fn load_snapshot_file(path: &Path) -> StorageResult<Option<CrawlSnapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::CheckpointCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
