//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching
//! - Content extraction (text, tables, images, attachments, links)
//! - The worker tasks that drive URLs through the state machine
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod worker;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use extractor::{clean_text, extract, ExtractError, ExtractOptions, ExtractedPage};
pub use fetcher::{build_http_client, fetch_page, FetchError, FetchedPage};
pub use worker::{run_worker, WorkerContext, WorkerPhase, WorkerStats};
