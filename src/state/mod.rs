//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlStatus`: the four statuses a URL can be in
//! - `CrawlState`: the shared, checkpointed state machine owning every URL's status

mod crawl_status;
mod machine;

// Re-export main types
pub use crawl_status::CrawlStatus;
pub use machine::{CrawlState, StatusCounts};
