//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the supervisor that coordinates a crawl run:
//! - Opening (or discarding) the checkpoint store and restoring state
//! - Seeding the configured start URLs
//! - Spawning the worker pool
//! - Waiting for the crawl to drain, logging progress
//! - Stopping and joining the workers

use crate::config::Config;
use crate::crawler::extractor::ExtractOptions;
use crate::crawler::fetcher::build_http_client;
use crate::crawler::worker::{run_worker, WorkerContext, WorkerStats};
use crate::state::{CrawlState, StatusCounts};
use crate::storage::FileCheckpointStore;
use crate::url::{normalize, AllowedHosts, NormalizedUrl};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// Pages between two progress log lines
const PROGRESS_EVERY: usize = 10;

/// Summary of a finished crawl run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrawlReport {
    /// Final size of each status set
    pub counts: StatusCounts,
    /// Pages crawled by this run (excluding ones restored as already crawled)
    pub pages_crawled: usize,
    /// Pages that errored during this run
    pub pages_errored: usize,
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.pages_crawled + self.pages_errored) as f64 / secs
        } else {
            0.0
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    state: Arc<CrawlState>,
    context: Arc<WorkerContext>,
    seeds: Vec<NormalizedUrl>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration (already validated)
    /// * `fresh` - Whether to discard the previous checkpoint and entry log
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open storage or build the HTTP client
    pub fn new(config: Config, fresh: bool) -> crate::Result<Self> {
        let checkpoint_path = Path::new(&config.output.checkpoint_path);
        let entries_path = Path::new(&config.output.entries_path);

        if fresh {
            tracing::info!("Starting fresh crawl, discarding previous progress");
            FileCheckpointStore::discard(checkpoint_path, entries_path)?;
        }

        let store = FileCheckpointStore::open(checkpoint_path, entries_path)?;
        let allowed = AllowedHosts::new(&config.scope.allowed_hosts);
        let state = Arc::new(CrawlState::restore(Box::new(store), &allowed));

        let seeds = normalize_seeds(&config.scope.seeds, &allowed);
        let client =
            build_http_client(&config.user_agent, config.crawler.fetch_timeout(), &allowed)?;

        let context = Arc::new(WorkerContext {
            state: Arc::clone(&state),
            client,
            options: ExtractOptions::new(allowed, &config.crawler.attachment_extensions),
            poll_interval: config.crawler.poll_interval(),
        });

        Ok(Self {
            config: Arc::new(config),
            state,
            context,
            seeds,
        })
    }

    /// Shared crawl state, for inspection by callers and tests
    pub fn state(&self) -> &Arc<CrawlState> {
        &self.state
    }

    /// Runs the crawl until nothing is pending or in progress
    ///
    /// 1. Seeds the configured start URLs (already-known URLs are skipped)
    /// 2. Spawns `worker-count` workers
    /// 3. Waits for the state to drain, waking on every transition or poll tick
    /// 4. Signals stop and joins every worker
    pub async fn run(&self) -> CrawlReport {
        let start_time = Instant::now();

        let seeded = self.state.seed(self.seeds.iter().cloned());
        tracing::info!("Seeded {} of {} start URLs", seeded, self.seeds.len());

        let worker_count = self.config.crawler.worker_count as usize;
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        for id in 0..worker_count {
            workers.spawn(run_worker(id, Arc::clone(&self.context), stop_rx.clone()));
        }
        tracing::info!("Started {} workers", worker_count);

        self.supervise(&mut workers, start_time).await;

        if stop_tx.send(true).is_err() {
            tracing::debug!("All workers already stopped");
        }

        let mut totals = WorkerStats::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stats) => {
                    totals.crawled += stats.crawled;
                    totals.errored += stats.errored;
                }
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }

        let report = CrawlReport {
            counts: self.state.counts(),
            pages_crawled: totals.crawled,
            pages_errored: totals.errored,
            elapsed: start_time.elapsed(),
        };

        tracing::info!(
            "Crawl completed: {} pages crawled, {} errored in {:?} ({:.2} pages/sec)",
            report.pages_crawled,
            report.pages_errored,
            report.elapsed,
            report.pages_per_second()
        );

        report
    }

    /// Waits until the state is done, logging progress along the way
    ///
    /// Returns early if every worker has exited, since nobody would be left to
    /// finish the URLs still in progress.
    async fn supervise(&self, workers: &mut JoinSet<WorkerStats>, start_time: Instant) {
        let poll_interval = self.config.crawler.poll_interval();
        let mut last_logged = 0;

        loop {
            let changed = self.state.changed();

            let counts = self.state.counts();
            if counts.is_done() {
                tracing::info!("Nothing pending or in progress, stopping workers");
                return;
            }

            let finished = counts.crawled + counts.errored;
            if finished >= last_logged + PROGRESS_EVERY {
                last_logged = finished;
                let rate = finished as f64 / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
                tracing::info!(
                    "Progress: {} crawled, {} errored, {} pending, {} in progress, {:.2} pages/sec",
                    counts.crawled,
                    counts.errored,
                    counts.pending,
                    counts.in_progress,
                    rate
                );
            }

            tokio::select! {
                _ = changed => {}
                _ = tokio::time::sleep(poll_interval) => {}
                Some(joined) = workers.join_next() => {
                    match joined {
                        Ok(stats) => tracing::error!("Worker exited early after {} pages", stats.crawled + stats.errored),
                        Err(e) => tracing::error!("Worker task failed: {}", e),
                    }
                    if workers.is_empty() {
                        tracing::error!("No workers left; {} URLs still in progress", counts.in_progress);
                        return;
                    }
                }
            }
        }
    }
}

/// Normalizes the configured seeds against their own URL
///
/// Validation has already rejected unusable seeds; any that slip through are
/// skipped with a warning.
fn normalize_seeds(seeds: &[String], allowed: &AllowedHosts) -> Vec<NormalizedUrl> {
    seeds
        .iter()
        .filter_map(|seed| {
            let normalized = Url::parse(seed)
                .ok()
                .and_then(|base| normalize(seed, &base, allowed));
            if normalized.is_none() {
                tracing::warn!("Skipping seed outside the crawl scope: {}", seed);
            }
            normalized
        })
        .collect()
}

/// Runs a complete crawl with the given configuration
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::load_config;
/// use sumi_harvest::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = run_crawl(config, false).await?;
/// println!("{} pages crawled", report.pages_crawled);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, fresh: bool) -> crate::Result<CrawlReport> {
    let coordinator = Coordinator::new(config, fresh)?;
    Ok(coordinator.run().await)
}
