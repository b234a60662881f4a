//! Append-only page entry log
//!
//! One JSON object per line. Appends are a single write followed by an
//! fsync; a crash can therefore only leave an unterminated record at the very
//! end of the file, which [`EntryLog::open`] repairs.

use crate::storage::{PageEntry, StorageError, StorageResult};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Handle to an open entry log
#[derive(Debug)]
pub struct EntryLog {
    path: PathBuf,
    file: File,
    len: u64,
}

impl EntryLog {
    /// Opens (or creates) the log at `path`, repairing a partial trailing record
    ///
    /// A trailing record that is complete JSON but lacks its newline is kept
    /// and terminated; anything else after the last newline is truncated.
    /// Records before the last newline are never touched.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match check_tail(path) {
            Ok(()) => {}
            Err(StorageError::PartialAppendCorrupt {
                valid_len,
                total_len,
                ..
            }) => repair_tail(path, valid_len, total_len)?,
            Err(e) => return Err(e),
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Appends one entry as a single JSON line
    ///
    /// If the write fails part-way, the file is cut back to its previous
    /// length so the next append does not land on a half-written record.
    pub fn append(&mut self, entry: &PageEntry) -> StorageResult<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let written = self
            .file
            .write_all(&line)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            if let Err(truncate_err) = self.file.set_len(self.len) {
                tracing::error!(
                    "Failed to roll back partial append to {}: {}",
                    self.path.display(),
                    truncate_err
                );
            }
            return Err(e.into());
        }

        self.len += line.len() as u64;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Checks whether the log ends on a record boundary
///
/// # Returns
///
/// * `Ok(())` - The file is missing, empty, or ends with a newline
/// * `Err(StorageError::PartialAppendCorrupt)` - Bytes follow the last newline
fn check_tail(path: &Path) -> StorageResult<()> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let valid_len = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    if valid_len < bytes.len() {
        return Err(StorageError::PartialAppendCorrupt {
            path: path.display().to_string(),
            valid_len: valid_len as u64,
            total_len: bytes.len() as u64,
        });
    }

    Ok(())
}

fn repair_tail(path: &Path, valid_len: u64, total_len: u64) -> StorageResult<()> {
    let bytes = std::fs::read(path)?;
    let tail = &bytes[valid_len as usize..];

    if serde_json::from_slice::<PageEntry>(tail).is_ok() {
        tracing::warn!(
            "Entry log {} ended without a newline; keeping the complete last record",
            path.display()
        );
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(b"\n")?;
        file.sync_data()?;
    } else {
        tracing::warn!(
            "Entry log {} ends with a partial record; discarding {} trailing bytes",
            path.display(),
            total_len - valid_len
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(valid_len)?;
        file.sync_data()?;
    }

    Ok(())
}

/// Reads every complete entry from a log file
///
/// Lines that do not parse (including an unterminated tail) are skipped with
/// a warning.
pub fn read_entries(path: &Path) -> StorageResult<Vec<PageEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PageEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(
                "Skipping unreadable record at {}:{}: {}",
                path.display(),
                index + 1,
                e
            ),
        }
    }

    Ok(entries)
}
