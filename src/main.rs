//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest content harvester.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::crawler::run_crawl;
use sumi_harvest::output::{dedup_entries, export_urls, load_statistics, print_statistics};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a resumable, host-restricted content harvester
///
/// Sumi-Harvest crawls every page reachable inside a fixed set of hosts and
/// records each page's text, tables, images and attachment links. Progress is
/// checkpointed continuously, so an interrupted crawl picks up where it left off.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, host-restricted content harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard the checkpoint and entry log and start over
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "dedup", "export_urls", "fresh"])]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "dedup", "export_urls", "fresh"])]
    stats: bool,

    /// Merge entry logs into OUT, dropping duplicate and trap URLs, and exit
    #[arg(long, value_name = "OUT", conflicts_with_all = ["dry_run", "stats", "export_urls", "fresh"])]
    dedup: Option<PathBuf>,

    /// Write the URL of every entry to OUT as a JSON array and exit
    #[arg(long, value_name = "OUT", conflicts_with_all = ["dry_run", "stats", "dedup", "fresh"])]
    export_urls: Option<PathBuf>,

    /// Entry files read by --dedup / --export-urls (default: the configured entry log)
    #[arg(long = "input", value_name = "FILE")]
    inputs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(out) = &cli.dedup {
        handle_dedup(&config, &cli.inputs, out)?;
    } else if let Some(out) = &cli.export_urls {
        handle_export_urls(&config, &cli.inputs, out)?;
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.worker_count);
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!("  Poll interval: {}ms", config.crawler.poll_interval_ms);
    println!(
        "  Attachment extensions: {}",
        config.crawler.attachment_extensions.join(", ")
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    println!("  Entries: {}", config.output.entries_path);

    println!("\nAllowed Hosts ({}):", config.scope.allowed_hosts.len());
    for host in &config.scope.allowed_hosts {
        println!("  - {}", host);
    }

    println!("\nSeeds ({}):", config.scope.seeds.len());
    for seed in &config.scope.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
    if Path::new(&config.output.checkpoint_path).exists() {
        println!(
            "✓ Would resume from checkpoint {}",
            config.output.checkpoint_path
        );
    } else {
        println!(
            "✓ Would start crawling with {} seed URLs",
            config.scope.seeds.len()
        );
    }
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> Result<()> {
    println!("Checkpoint: {}\n", config.output.checkpoint_path);

    let stats = load_statistics(
        Path::new(&config.output.checkpoint_path),
        Path::new(&config.output.entries_path),
    )
    .context("Failed to load crawl statistics")?;

    print_statistics(&stats);

    Ok(())
}

/// The explicit inputs, or the configured entry log when none were given
fn batch_inputs(config: &Config, inputs: &[PathBuf]) -> Vec<PathBuf> {
    if inputs.is_empty() {
        vec![PathBuf::from(&config.output.entries_path)]
    } else {
        inputs.to_vec()
    }
}

/// Handles the --dedup mode: merges entry logs without repeats
fn handle_dedup(config: &Config, inputs: &[PathBuf], out: &Path) -> Result<()> {
    let inputs = batch_inputs(config, inputs);
    let report = dedup_entries(&inputs, out)?;

    println!("Files read: {}", report.files_read);
    println!("Total entries before filtering: {}", report.entries_before);
    println!("Total entries after filtering: {}", report.entries_after);
    println!("  Repeated path segments: {}", report.dropped_repeated_segment);
    println!("  Duplicate URLs: {}", report.dropped_duplicate);
    println!("  Missing URL: {}", report.dropped_without_url);
    println!("✓ Filtered output saved to: {}", out.display());

    Ok(())
}

/// Handles the --export-urls mode: writes the crawled URL list
fn handle_export_urls(config: &Config, inputs: &[PathBuf], out: &Path) -> Result<()> {
    let inputs = batch_inputs(config, inputs);
    let count = export_urls(&inputs, out)?;

    println!("✓ Exported {} URLs to: {}", count, out.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> Result<()> {
    tracing::info!(
        "Allowed hosts: {}, seeds: {}, workers: {}",
        config.scope.allowed_hosts.len(),
        config.scope.seeds.len(),
        config.crawler.worker_count
    );

    let report = run_crawl(config, fresh).await.context("Crawl failed")?;

    println!(
        "✓ Crawl finished: {} crawled, {} errored ({} URLs known) in {:.1}s",
        report.counts.crawled,
        report.counts.errored,
        report.counts.total(),
        report.elapsed.as_secs_f64()
    );

    Ok(())
}
