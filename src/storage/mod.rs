//! Storage module for persisting crawl progress
//!
//! This module handles everything that touches disk during a crawl:
//! - The crawl snapshot (four status sets), replaced atomically after each transition
//! - The append-only page entry log (JSON Lines), recovered on open after a crash
//! - The `CheckpointStore` trait the state machine writes through

mod checkpoint;
mod entry_log;
mod traits;

pub use checkpoint::{load_snapshot_file, FileCheckpointStore};
pub use entry_log::{read_entries, EntryLog};
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::state::CrawlStatus;
use crate::url::NormalizedUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The persisted output record for one successfully crawled page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEntry {
    /// Stable identifier derived from the URL
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    /// Visible text with tables and images removed
    pub text: String,
    /// One row-pipe rendering per table, in document order
    pub tables: Vec<String>,
    pub images: Vec<String>,
    pub attachments: Vec<String>,
    pub crawled_at: DateTime<Utc>,
}

impl PageEntry {
    /// Creates an entry stamped with the current time
    pub fn new(
        url: &NormalizedUrl,
        text: String,
        tables: Vec<String>,
        images: Vec<String>,
        attachments: Vec<String>,
    ) -> Self {
        Self {
            id: entry_id(url.as_str()),
            url: url.to_string(),
            text,
            tables,
            images,
            attachments,
            crawled_at: Utc::now(),
        }
    }
}

/// Hex SHA-256 of the URL, so re-crawls of a page share an identifier
pub fn entry_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialized form of the four status sets
///
/// Missing keys default to empty, so progress files without an `errored`
/// list can still be resumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    #[serde(default)]
    pub pending: Vec<String>,
    #[serde(default)]
    pub in_progress: Vec<String>,
    #[serde(default)]
    pub crawled: Vec<String>,
    #[serde(default)]
    pub errored: Vec<String>,
}

impl CrawlSnapshot {
    /// Builds a snapshot from `(url, status)` pairs; each list is sorted
    pub fn from_statuses<'a, I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = (&'a NormalizedUrl, &'a CrawlStatus)>,
    {
        let mut snapshot = Self::default();
        for (url, status) in statuses {
            let list = match status {
                CrawlStatus::Pending => &mut snapshot.pending,
                CrawlStatus::InProgress => &mut snapshot.in_progress,
                CrawlStatus::Crawled => &mut snapshot.crawled,
                CrawlStatus::Errored => &mut snapshot.errored,
            };
            list.push(url.to_string());
        }
        snapshot.pending.sort();
        snapshot.in_progress.sort();
        snapshot.crawled.sort();
        snapshot.errored.sort();
        snapshot
    }

    /// Each status paired with its URL list
    pub fn sets(&self) -> [(CrawlStatus, &[String]); 4] {
        [
            (CrawlStatus::Pending, self.pending.as_slice()),
            (CrawlStatus::InProgress, self.in_progress.as_slice()),
            (CrawlStatus::Crawled, self.crawled.as_slice()),
            (CrawlStatus::Errored, self.errored.as_slice()),
        ]
    }

    pub fn total(&self) -> usize {
        self.pending.len() + self.in_progress.len() + self.crawled.len() + self.errored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Path of the scratch file used while replacing `path`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replaces `path` with `bytes` via write-to-temp, fsync, rename
///
/// Readers only ever see the old content or the new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}
