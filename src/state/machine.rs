//! The shared crawl state machine
//!
//! `CrawlState` is the single owner of every URL's status. Each operation runs
//! inside one mutex critical section that also performs the matching durable
//! write (entry append and/or snapshot), so a process starting from the files
//! on disk never observes a state that memory did not pass through.

use crate::state::CrawlStatus;
use crate::storage::{CheckpointStore, CrawlSnapshot, PageEntry, StorageResult};
use crate::url::{normalize, AllowedHosts, NormalizedUrl};
use crate::HarvestError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use url::Url;

/// Sizes of the four status sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub crawled: usize,
    pub errored: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.crawled + self.errored
    }

    /// Same predicate as [`CrawlState::is_done`]
    pub fn is_done(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}

struct Inner {
    statuses: HashMap<NormalizedUrl, CrawlStatus>,
    /// Claim order for `Pending` URLs; always holds exactly the pending set
    queue: VecDeque<NormalizedUrl>,
    store: Box<dyn CheckpointStore>,
}

impl Inner {
    fn persist(&mut self) -> StorageResult<()> {
        let snapshot = CrawlSnapshot::from_statuses(self.statuses.iter());
        self.store.save_snapshot(&snapshot)
    }

    /// Writes a snapshot after a transition that memory has already made
    ///
    /// A failed write is logged, not returned: the next transition rewrites
    /// the whole snapshot from memory.
    fn persist_or_log(&mut self, transition: &str, url: &NormalizedUrl) {
        if let Err(e) = self.persist() {
            tracing::error!("Failed to snapshot {} of {}: {}", transition, url, e);
        }
    }

    /// Adds `url` as pending unless it is already known; returns true if added
    fn enqueue(&mut self, url: NormalizedUrl) -> bool {
        if self.statuses.contains_key(&url) {
            return false;
        }
        self.statuses.insert(url.clone(), CrawlStatus::Pending);
        self.queue.push_back(url);
        true
    }

    fn require(&self, url: &NormalizedUrl, to: CrawlStatus) -> crate::Result<()> {
        let from = self.statuses.get(url).copied();
        match from {
            Some(current) if current.can_transition_to(to) => Ok(()),
            _ => Err(HarvestError::InvalidTransition {
                url: url.to_string(),
                from,
                to,
            }),
        }
    }

    fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in self.statuses.values() {
            match status {
                CrawlStatus::Pending => counts.pending += 1,
                CrawlStatus::InProgress => counts.in_progress += 1,
                CrawlStatus::Crawled => counts.crawled += 1,
                CrawlStatus::Errored => counts.errored += 1,
            }
        }
        counts
    }
}

/// Shared state machine tracking every URL the crawl has observed
///
/// A URL, once observed, is never forgotten, and its status only moves
/// forward: `Pending -> InProgress -> Crawled | Errored`.
pub struct CrawlState {
    inner: Mutex<Inner>,
    changed: Notify,
}

impl CrawlState {
    /// Creates an empty state machine persisting through `store`
    pub fn new(store: Box<dyn CheckpointStore>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                statuses: HashMap::new(),
                queue: VecDeque::new(),
                store,
            }),
            changed: Notify::new(),
        }
    }

    /// Rebuilds the state machine from the store's last snapshot
    ///
    /// - A URL listed under several statuses keeps the most advanced one.
    /// - `InProgress` URLs were interrupted before their entry was committed,
    ///   so they are queued again as `Pending`.
    /// - Pending URLs are re-checked against the normalizer; ones it rejects
    ///   (for example from an older, laxer run) are dropped.
    pub fn restore(store: Box<dyn CheckpointStore>, allowed: &AllowedHosts) -> Self {
        let snapshot = store.restore();
        let state = Self::new(store);

        let mut best: HashMap<&str, CrawlStatus> = HashMap::new();
        for (status, urls) in snapshot.sets() {
            for url in urls {
                let entry = best.entry(url.as_str()).or_insert(status);
                if status.rank() > entry.rank() {
                    *entry = status;
                }
            }
        }

        let mut inner = state.lock();
        let mut open: Vec<&str> = Vec::new();
        for (url, status) in &best {
            if status.is_terminal() {
                inner
                    .statuses
                    .insert(NormalizedUrl::from_trusted(url.to_string()), *status);
            } else {
                open.push(*url);
            }
        }

        open.sort_unstable();
        let mut requeued = 0;
        let mut dropped = 0;
        for raw in open {
            let normalized = Url::parse(raw)
                .ok()
                .and_then(|base| normalize(raw, &base, allowed));
            match normalized {
                Some(url) => {
                    if best.get(raw) == Some(&CrawlStatus::InProgress) {
                        requeued += 1;
                    }
                    inner.enqueue(url);
                }
                None => {
                    tracing::warn!("Dropping restored URL outside the crawl scope: {}", raw);
                    dropped += 1;
                }
            }
        }

        if requeued > 0 || dropped > 0 {
            if let Err(e) = inner.persist() {
                tracing::error!("Failed to snapshot restored crawl state: {}", e);
            }
        }

        let counts = inner.counts();
        drop(inner);

        if counts.total() > 0 {
            tracing::info!(
                "Restored crawl state: {} pending ({} interrupted), {} crawled, {} errored, {} dropped",
                counts.pending,
                requeued,
                counts.crawled,
                counts.errored,
                dropped
            );
        }

        state
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means some worker panicked; the maps are
        // still well formed.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds each URL to `Pending` unless it is already known
    ///
    /// Seeding is idempotent. Returns how many URLs were added.
    pub fn seed<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = NormalizedUrl>,
    {
        let mut inner = self.lock();
        let added: Vec<NormalizedUrl> = urls
            .into_iter()
            .filter(|url| inner.enqueue(url.clone()))
            .collect();

        if let Some(first) = added.first() {
            inner.persist_or_log("seeding", first);
        }
        drop(inner);

        if !added.is_empty() {
            self.changed.notify_waiters();
        }
        added.len()
    }

    /// Claims the next pending URL for the calling worker
    ///
    /// Returns `None` whenever nothing is pending, even if other workers still
    /// hold URLs in progress; callers wait and retry.
    pub fn claim(&self) -> Option<NormalizedUrl> {
        let mut inner = self.lock();
        let url = inner.queue.pop_front()?;
        inner.statuses.insert(url.clone(), CrawlStatus::InProgress);

        inner.persist_or_log("claim", &url);

        Some(url)
    }

    /// Records a successfully crawled URL
    ///
    /// Appends `entry` to the entry log, marks `url` as `Crawled`, queues every
    /// discovered URL not seen before, and writes a snapshot. Returns how many
    /// URLs were newly queued.
    ///
    /// # Errors
    ///
    /// * `InvalidTransition` - `url` is not in progress; nothing is written
    /// * `Storage` - the entry could not be appended; `url` stays in progress
    ///
    /// Once the entry is appended the call succeeds even if the snapshot
    /// cannot be written.
    pub fn complete(
        &self,
        url: &NormalizedUrl,
        entry: &PageEntry,
        discovered: &[NormalizedUrl],
    ) -> crate::Result<usize> {
        let mut inner = self.lock();
        inner.require(url, CrawlStatus::Crawled)?;

        inner.store.append_entry(entry)?;
        inner.statuses.insert(url.clone(), CrawlStatus::Crawled);

        let queued = discovered
            .iter()
            .filter(|link| inner.enqueue((*link).clone()))
            .count();

        inner.persist_or_log("completion", url);
        drop(inner);

        self.changed.notify_waiters();
        Ok(queued)
    }

    /// Records a URL whose fetch or extraction failed
    ///
    /// Errored URLs are never retried.
    pub fn fail(&self, url: &NormalizedUrl) -> crate::Result<()> {
        let mut inner = self.lock();
        inner.require(url, CrawlStatus::Errored)?;
        inner.statuses.insert(url.clone(), CrawlStatus::Errored);

        inner.persist_or_log("failure", url);
        drop(inner);

        self.changed.notify_waiters();
        Ok(())
    }

    /// True iff nothing is pending and nothing is in progress
    pub fn is_done(&self) -> bool {
        self.lock().counts().is_done()
    }

    pub fn counts(&self) -> StatusCounts {
        self.lock().counts()
    }

    pub fn status_of(&self, url: &NormalizedUrl) -> Option<CrawlStatus> {
        self.lock().statuses.get(url).copied()
    }

    /// Current state in checkpoint form
    pub fn snapshot(&self) -> CrawlSnapshot {
        CrawlSnapshot::from_statuses(self.lock().statuses.iter())
    }

    /// Resolves after the next transition that adds work or finishes a URL
    ///
    /// Wake-ups are only delivered to futures that exist when the transition
    /// happens, so callers pair this with a timeout.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }
}
