//! Statistics generation from the crawl checkpoint
//!
//! This module provides functionality for summarizing a crawl from its
//! snapshot (and, when available, its entry log) and displaying the result.

use crate::state::CrawlStatus;
use crate::storage::{load_snapshot_file, read_entries, CrawlSnapshot, PageEntry, StorageResult};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use url::Url;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of URLs the crawl has observed
    pub total_urls: u64,

    /// Count of URLs by status
    pub urls_by_status: HashMap<CrawlStatus, u64>,

    /// Number of distinct hosts among observed URLs
    pub unique_hosts: u64,

    /// Totals over the entry log, if it was read
    pub entries: Option<EntrySummary>,
}

/// Totals over the committed page entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntrySummary {
    pub entries: u64,
    pub tables: u64,
    pub images: u64,
    pub attachments: u64,
    /// Entries whose cleaned text is empty
    pub empty_text: u64,
}

impl CrawlStatistics {
    /// Computes statistics from a snapshot
    pub fn from_snapshot(snapshot: &CrawlSnapshot) -> Self {
        let mut urls_by_status = HashMap::new();
        let mut hosts = HashSet::new();

        for (status, urls) in snapshot.sets() {
            if !urls.is_empty() {
                urls_by_status.insert(status, urls.len() as u64);
            }
            for url in urls {
                if let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
                    hosts.insert(host);
                }
            }
        }

        Self {
            total_urls: snapshot.total() as u64,
            urls_by_status,
            unique_hosts: hosts.len() as u64,
            entries: None,
        }
    }

    /// Adds entry log totals
    pub fn with_entries(mut self, entries: &[PageEntry]) -> Self {
        let mut summary = EntrySummary::default();
        for entry in entries {
            summary.entries += 1;
            summary.tables += entry.tables.len() as u64;
            summary.images += entry.images.len() as u64;
            summary.attachments += entry.attachments.len() as u64;
            if entry.text.is_empty() {
                summary.empty_text += 1;
            }
        }
        self.entries = Some(summary);
        self
    }

    pub fn count(&self, status: CrawlStatus) -> u64 {
        self.urls_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of finished URLs that were crawled successfully, in percent
    pub fn success_rate(&self) -> f64 {
        let crawled = self.count(CrawlStatus::Crawled);
        let finished = crawled + self.count(CrawlStatus::Errored);
        if finished > 0 {
            (crawled as f64 / finished as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from the checkpoint and entry log
///
/// A missing checkpoint yields empty statistics; a missing entry log leaves
/// `entries` unset.
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - A file exists but could not be read or parsed
pub fn load_statistics(checkpoint_path: &Path, entries_path: &Path) -> StorageResult<CrawlStatistics> {
    let snapshot = load_snapshot_file(checkpoint_path)?.unwrap_or_default();
    let stats = CrawlStatistics::from_snapshot(&snapshot);

    if entries_path.exists() {
        let entries = read_entries(entries_path)?;
        Ok(stats.with_entries(&entries))
    } else {
        Ok(stats)
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Total URLs observed: {}", stats.total_urls);
    println!("  Unique hosts: {}", stats.unique_hosts);
    println!();

    println!("URLs by Status:");
    for status in CrawlStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total_urls > 0 {
            (count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if let Some(entries) = &stats.entries {
        println!("Entry Log:");
        println!("  Entries: {}", entries.entries);
        println!("  Tables: {}", entries.tables);
        println!("  Images: {}", entries.images);
        println!("  Attachments: {}", entries.attachments);
        if entries.empty_text > 0 {
            println!("  Entries without text: {}", entries.empty_text);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} crawled, {} errored)",
        stats.success_rate(),
        stats.count(CrawlStatus::Crawled),
        stats.count(CrawlStatus::Errored)
    );
}
