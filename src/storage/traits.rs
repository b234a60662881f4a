//! Storage traits and error types
//!
//! This module defines the trait interface the crawl state machine persists
//! through, and the associated error types.

use crate::storage::{CrawlSnapshot, PageEntry};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint {path} is corrupt: {reason}")]
    CheckpointCorrupt { path: String, reason: String },

    #[error("Entry log {path} ends with a partial record ({valid_len} of {total_len} bytes complete)")]
    PartialAppendCorrupt {
        path: String,
        valid_len: u64,
        total_len: u64,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of the crawl snapshot and the page entry log
///
/// Implementations are only ever called from inside the state machine's
/// critical section, so they need no locking of their own.
pub trait CheckpointStore: Send {
    /// Replaces the previous snapshot with `snapshot` atomically
    fn save_snapshot(&mut self, snapshot: &CrawlSnapshot) -> StorageResult<()>;

    /// Reads the last snapshot
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No snapshot has been written yet
    /// * `Err(StorageError::CheckpointCorrupt)` - The snapshot could not be parsed
    fn load_snapshot(&self) -> StorageResult<Option<CrawlSnapshot>>;

    /// Appends one entry without touching earlier ones
    fn append_entry(&mut self, entry: &PageEntry) -> StorageResult<()>;

    /// Reads the last snapshot, falling back to an empty one
    ///
    /// A missing or unreadable snapshot means the crawl starts fresh; neither
    /// is fatal.
    fn restore(&self) -> CrawlSnapshot {
        match self.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => CrawlSnapshot::default(),
            Err(e) => {
                tracing::warn!("{}; starting with empty crawl state", e);
                CrawlSnapshot::default()
            }
        }
    }
}
