//! Crawl worker tasks
//!
//! Each worker repeatedly claims a pending URL, fetches and extracts it, and
//! commits the outcome to the shared [`CrawlState`]. Workers never decide on
//! their own that the crawl is over; they run until the supervisor signals stop
//! and there is nothing left to claim.

use crate::crawler::extractor::{extract, ExtractOptions};
use crate::crawler::fetcher::fetch_page;
use crate::state::CrawlState;
use crate::storage::PageEntry;
use crate::url::NormalizedUrl;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What a worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Idle,
    Claiming,
    Fetching,
    Extracting,
    Committing,
}

/// Everything a worker shares with its siblings
pub struct WorkerContext {
    pub state: Arc<CrawlState>,
    pub client: Client,
    pub options: ExtractOptions,
    pub poll_interval: Duration,
}

/// Per-worker tallies, summed by the supervisor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub crawled: usize,
    pub errored: usize,
}

/// How one claimed URL ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Crawled,
    Errored,
}

struct Worker {
    id: usize,
    phase: WorkerPhase,
}

impl Worker {
    fn enter(&mut self, phase: WorkerPhase) {
        tracing::trace!("Worker {}: {:?} -> {:?}", self.id, self.phase, phase);
        self.phase = phase;
    }
}

/// Runs one worker until `stop` is set and nothing is pending
pub async fn run_worker(
    id: usize,
    ctx: Arc<WorkerContext>,
    mut stop: watch::Receiver<bool>,
) -> WorkerStats {
    let mut worker = Worker {
        id,
        phase: WorkerPhase::Idle,
    };
    let mut stats = WorkerStats::default();

    tracing::debug!("Worker {} started", id);

    loop {
        // Registered before claiming so a transition between the claim and
        // the wait still wakes us.
        let changed = ctx.state.changed();

        worker.enter(WorkerPhase::Claiming);
        if let Some(url) = ctx.state.claim() {
            match process_url(&mut worker, &ctx, &url).await {
                Outcome::Crawled => stats.crawled += 1,
                Outcome::Errored => stats.errored += 1,
            }
            worker.enter(WorkerPhase::Idle);
            continue;
        }
        worker.enter(WorkerPhase::Idle);

        if *stop.borrow() {
            break;
        }

        tokio::select! {
            _ = changed => {}
            result = stop.changed() => {
                if result.is_err() {
                    // Supervisor is gone; nothing will ever signal again
                    break;
                }
            }
            _ = tokio::time::sleep(ctx.poll_interval) => {}
        }
    }

    tracing::debug!(
        "Worker {} stopped ({} crawled, {} errored)",
        id,
        stats.crawled,
        stats.errored
    );
    stats
}

/// Fetches, extracts and commits one claimed URL
///
/// Every failure ends in `fail(url)` so the URL never stays in progress.
async fn process_url(worker: &mut Worker, ctx: &WorkerContext, url: &NormalizedUrl) -> Outcome {
    tracing::debug!("Worker {} crawling {}", worker.id, url);

    worker.enter(WorkerPhase::Fetching);
    let page = match fetch_page(&ctx.client, url.as_str(), &ctx.options.allowed_hosts).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!("Failed to fetch {} ({}): {}", url, e.kind(), e);
            return record_failure(worker, ctx, url);
        }
    };

    worker.enter(WorkerPhase::Extracting);
    let extracted = match extract(
        page.final_url.as_str(),
        &page.body,
        &page.headers,
        &ctx.options,
    ) {
        Ok(extracted) => extracted,
        Err(e) => {
            tracing::warn!("Failed to extract {}: {}", url, e);
            return record_failure(worker, ctx, url);
        }
    };

    worker.enter(WorkerPhase::Committing);
    let entry = PageEntry::new(
        url,
        extracted.text,
        extracted.tables,
        extracted.images,
        extracted.attachments,
    );

    match ctx.state.complete(url, &entry, &extracted.links) {
        Ok(queued) => {
            tracing::debug!(
                "Crawled {} ({} links, {} new)",
                url,
                extracted.links.len(),
                queued
            );
            Outcome::Crawled
        }
        Err(e) => {
            tracing::error!("Failed to commit {}: {}", url, e);
            record_failure(worker, ctx, url)
        }
    }
}

fn record_failure(worker: &mut Worker, ctx: &WorkerContext, url: &NormalizedUrl) -> Outcome {
    worker.enter(WorkerPhase::Committing);
    if let Err(e) = ctx.state.fail(url) {
        tracing::error!("Failed to record error for {}: {}", url, e);
    }
    Outcome::Errored
}
