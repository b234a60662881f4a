//! Output module for reporting on and post-processing crawl results
//!
//! This module handles:
//! - Statistics over the checkpoint and entry log
//! - Merging and deduplicating entry logs
//! - Exporting the crawled URL list

mod batch;
pub mod stats;

pub use batch::{dedup_entries, export_urls, DedupReport};
pub use stats::{load_statistics, print_statistics, CrawlStatistics, EntrySummary};
