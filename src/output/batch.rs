//! Post-processing over finished entry logs
//!
//! These jobs run outside a crawl. They read entry files as loosely typed JSON
//! so that logs written by older versions (or the legacy single-array format)
//! can still be processed.

use crate::storage::write_atomic;
use crate::url::has_repeated_segment;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

/// Counts reported by [`dedup_entries`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub files_read: usize,
    /// Records read across all inputs
    pub entries_before: usize,
    /// Records written to the output
    pub entries_after: usize,
    pub dropped_repeated_segment: usize,
    pub dropped_duplicate: usize,
    /// Records without a string `url` field
    pub dropped_without_url: usize,
}

/// Merges entry files into one, dropping repeated and trap URLs
///
/// An entry is kept if it has a `url`, that URL's path does not repeat a
/// segment, and no earlier entry (in input order) had the same URL. Kept
/// entries are written to `out` as JSON Lines, replacing it atomically.
///
/// Unreadable inputs are skipped with a warning; only a failed write is fatal.
pub fn dedup_entries(inputs: &[PathBuf], out: &Path) -> Result<DedupReport> {
    let mut report = DedupReport::default();
    let mut seen = HashSet::new();
    let mut kept = Vec::new();

    for input in inputs {
        let records = match read_records(input) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Skipping {}: {:#}", input.display(), e);
                continue;
            }
        };
        report.files_read += 1;
        report.entries_before += records.len();

        for record in records {
            let Some(url) = record.get("url").and_then(Value::as_str) else {
                report.dropped_without_url += 1;
                continue;
            };

            if has_repeated_segment(&url_path(url)) {
                report.dropped_repeated_segment += 1;
                continue;
            }
            if !seen.insert(url.to_string()) {
                report.dropped_duplicate += 1;
                continue;
            }
            kept.push(record);
        }
    }

    let mut bytes = Vec::new();
    for record in &kept {
        serde_json::to_writer(&mut bytes, record)?;
        bytes.push(b'\n');
    }
    write_atomic(out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;

    report.entries_after = kept.len();
    tracing::info!(
        "Deduplicated {} entries from {} files into {} ({} kept)",
        report.entries_before,
        report.files_read,
        out.display(),
        report.entries_after
    );

    Ok(report)
}

/// Writes the `url` of every entry in `inputs` to `out` as a JSON array
///
/// Order follows the inputs; no deduplication is applied. Returns how many
/// URLs were written.
pub fn export_urls(inputs: &[PathBuf], out: &Path) -> Result<usize> {
    let mut urls = Vec::new();

    for input in inputs {
        let records = read_records(input)?;
        urls.extend(
            records
                .iter()
                .filter_map(|record| record.get("url").and_then(Value::as_str))
                .map(str::to_string),
        );
    }

    let bytes = serde_json::to_vec_pretty(&urls)?;
    write_atomic(out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;

    tracing::info!("Exported {} URLs to {}", urls.len(), out.display());
    Ok(urls.len())
}

/// Reads one entry file, either JSON Lines or a single JSON array
fn read_records(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON array in {}", path.display()));
    }

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                "Skipping unreadable record at {}:{}: {}",
                path.display(),
                index + 1,
                e
            ),
        }
    }
    Ok(records)
}

fn url_path(url: &str) -> String {
    Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}
