use serde::Deserialize;
use std::time::Duration;

/// Extensions treated as downloadable attachments when no list is configured
pub const DEFAULT_ATTACHMENT_EXTENSIONS: &[&str] =
    &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip"];

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub scope: ScopeConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    #[serde(rename = "worker-count")]
    pub worker_count: u32,

    /// Upper bound for a single fetch (milliseconds)
    #[serde(rename = "fetch-timeout-ms")]
    pub fetch_timeout_ms: u64,

    /// How often idle workers and the supervisor re-check the state (milliseconds)
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Link target extensions collected as attachments (without the dot)
    #[serde(rename = "attachment-extensions", default = "default_attachment_extensions")]
    pub attachment_extensions: Vec<String>,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_attachment_extensions() -> Vec<String> {
    DEFAULT_ATTACHMENT_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the crawl snapshot (rewritten atomically)
    #[serde(rename = "checkpoint-path", default = "default_checkpoint_path")]
    pub checkpoint_path: String,

    /// Path of the append-only page entry log
    #[serde(rename = "entries-path", default = "default_entries_path")]
    pub entries_path: String,
}

fn default_checkpoint_path() -> String {
    "crawl_progress.json".to_string()
}

fn default_entries_path() -> String {
    "crawled_data.jsonl".to_string()
}

/// Which pages belong to the crawl
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// URLs the crawl starts from
    pub seeds: Vec<String>,

    /// Hosts that may be crawled (exact match, subdomains must be listed)
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,
}
