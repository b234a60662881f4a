/// Crawl status definitions
///
/// Every URL the crawl has ever observed is in exactly one of these states.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current status of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    // ===== Active States =====
    /// Discovered but not yet claimed by a worker
    Pending,

    /// Claimed by exactly one worker; fetch or extraction underway
    InProgress,

    // ===== Terminal States =====
    /// Successfully processed and its entry persisted
    Crawled,

    /// Fetch or extraction failed; never retried
    Errored,
}

impl CrawlStatus {
    /// Returns true if no further processing will happen for this URL
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Crawled | Self::Errored)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Only `Pending -> InProgress`, `InProgress -> Crawled` and
    /// `InProgress -> Errored` exist. Nothing ever moves back to `Pending`.
    pub fn can_transition_to(&self, next: CrawlStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Crawled)
                | (Self::InProgress, Self::Errored)
        )
    }

    /// Precedence used when a restored snapshot lists a URL more than once
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Errored => 2,
            Self::Crawled => 3,
        }
    }

    /// Name used in the checkpoint file
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Crawled => "crawled",
            Self::Errored => "errored",
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::InProgress, Self::Crawled, Self::Errored]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
