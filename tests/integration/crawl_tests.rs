//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, including resuming from a checkpoint.

use std::path::{Path, PathBuf};
use std::time::Duration;
use sumi_harvest::config::{
    Config, CrawlerConfig, OutputConfig, ScopeConfig, UserAgentConfig,
    DEFAULT_ATTACHMENT_EXTENSIONS,
};
use sumi_harvest::crawler::{run_crawl, Coordinator};
use sumi_harvest::state::CrawlStatus;
use sumi_harvest::storage::{load_snapshot_file, read_entries, CrawlSnapshot, PageEntry};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling the mock server
fn create_test_config(server: &MockServer, dir: &Path, worker_count: u32) -> Config {
    let host = url::Url::parse(&server.uri())
        .expect("Failed to parse base URL")
        .host_str()
        .expect("Failed to extract host")
        .to_string();

    Config {
        crawler: CrawlerConfig {
            worker_count,
            fetch_timeout_ms: 5_000,
            poll_interval_ms: 50, // Very short for testing
            attachment_extensions: DEFAULT_ATTACHMENT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: None,
        },
        output: OutputConfig {
            checkpoint_path: dir.join("crawl_progress.json").display().to_string(),
            entries_path: dir.join("crawled_data.jsonl").display().to_string(),
        },
        scope: ScopeConfig {
            seeds: vec![format!("{}/", server.uri())],
            allowed_hosts: vec![host],
        },
    }
}

fn entries_path(config: &Config) -> PathBuf {
    PathBuf::from(&config.output.entries_path)
}

fn snapshot(config: &Config) -> CrawlSnapshot {
    load_snapshot_file(Path::new(&config.output.checkpoint_path))
        .expect("Failed to read checkpoint")
        .expect("Checkpoint missing")
}

fn entry_for<'a>(entries: &'a [PageEntry], url: &str) -> &'a PageEntry {
    entries
        .iter()
        .find(|e| e.url == url)
        .unwrap_or_else(|| panic!("No entry for {}", url))
}

async fn mount_html(server: &MockServer, at: &str, body: String, times: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_deduplicates_links() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <p>Welcome</p>
            <a href="/about">About</a>
            <a href="/about#team">Team</a>
            <a href="/about/">About again</a>
            <a href="mailto:x@example.org">Mail</a>
            <a href="https://other.org/">Elsewhere</a>
        </body></html>"#
            .to_string(),
        1,
    )
    .await;
    mount_html(
        &server,
        "/about",
        r#"<html><body><h1>About us</h1><a href="/">Home</a></body></html>"#.to_string(),
        1,
    )
    .await;

    let config = create_test_config(&server, dir.path(), 2);
    let report = run_crawl(config.clone(), false)
        .await
        .expect("Crawl failed");

    assert_eq!(report.counts.crawled, 2);
    assert_eq!(report.counts.errored, 0);
    assert_eq!(report.counts.pending, 0);
    assert_eq!(report.counts.in_progress, 0);
    assert_eq!(report.pages_crawled, 2);

    let entries = read_entries(&entries_path(&config)).unwrap();
    assert_eq!(entries.len(), 2);

    let home = entry_for(&entries, &base);
    assert_eq!(home.text, "Home\nWelcome\nAbout\nTeam\nAbout again\nMail\nElsewhere");
    let about = entry_for(&entries, &format!("{}/about", base));
    assert!(about.text.contains("About us"));

    let snapshot = snapshot(&config);
    assert!(snapshot.pending.is_empty());
    assert!(snapshot.in_progress.is_empty());
    assert_eq!(snapshot.crawled, vec![base.clone(), format!("{}/about", base)]);
}

#[tokio::test]
async fn test_non_html_page_is_errored() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<a href="/files/report.pdf">Report</a>"#.to_string(),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.4\n".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), 2);
    let report = run_crawl(config.clone(), false).await.unwrap();

    assert_eq!(report.counts.crawled, 1);
    assert_eq!(report.counts.errored, 1);

    let pdf_url = format!("{}/files/report.pdf", base);
    let entries = read_entries(&entries_path(&config)).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.iter().all(|e| e.url != pdf_url));
    assert_eq!(entry_for(&entries, &base).attachments, vec![pdf_url.clone()]);

    assert_eq!(snapshot(&config).errored, vec![pdf_url]);
}

#[tokio::test]
async fn test_http_error_is_errored_and_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(
        &server,
        "/",
        r#"<a href="/gone">Gone</a><a href="/broken">Broken</a>"#.to_string(),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), 3);
    let report = run_crawl(config.clone(), false).await.unwrap();
    assert_eq!(report.counts.crawled, 1);
    assert_eq!(report.counts.errored, 2);

    // A second run over the finished checkpoint fetches nothing
    let report = run_crawl(config, false).await.unwrap();
    assert_eq!(report.pages_crawled, 0);
    assert_eq!(report.pages_errored, 0);
    assert_eq!(report.counts.errored, 2);
}

#[tokio::test]
async fn test_slow_page_times_out_and_is_errored() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_html(&server, "/", r#"<a href="/slow">Slow</a>"#.to_string(), 1).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<p>too late</p>")
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, dir.path(), 2);
    config.crawler.fetch_timeout_ms = 300;
    let report = run_crawl(config.clone(), false).await.unwrap();

    assert_eq!(report.counts.crawled, 1);
    assert_eq!(report.counts.errored, 1);
    assert_eq!(report.counts.pending, 0);
    assert_eq!(report.counts.in_progress, 0);

    let slow_url = format!("{}/slow", base);
    let entries = read_entries(&entries_path(&config)).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries.iter().all(|e| e.url != slow_url));
    assert_eq!(snapshot(&config).errored, vec![slow_url]);
}

#[tokio::test]
async fn test_tables_extracted_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_html(
        &server,
        "/",
        r#"<html><body>
            <p>Fees</p>
            <table>
              <tr><th>A</th><th>B</th></tr>
              <tr><td>1</td><td>2</td></tr>
            </table>
            <img src="/img/campus.jpg">
        </body></html>"#
            .to_string(),
        1,
    )
    .await;

    let config = create_test_config(&server, dir.path(), 1);
    run_crawl(config.clone(), false).await.unwrap();

    let entries = read_entries(&entries_path(&config)).unwrap();
    let home = entry_for(&entries, &base);
    assert_eq!(home.tables, vec!["| A | B |\n| --- | --- |\n| 1 | 2 |"]);
    assert_eq!(home.text, "Fees");
    assert_eq!(home.images, vec![format!("{}/img/campus.jpg", base)]);
}

#[tokio::test]
async fn test_repeated_segment_links_never_fetched() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_html(
        &server,
        "/",
        r#"<a href="/news/2020/news/2020">Trap</a><a href="/news/2020">News</a>"#.to_string(),
        1,
    )
    .await;
    mount_html(&server, "/news/2020", "<p>News</p>".to_string(), 1).await;
    Mock::given(method("GET"))
        .and(path("/news/2020/news/2020"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, dir.path(), 2);
    let report = run_crawl(config, false).await.unwrap();
    assert_eq!(report.counts.total(), 2);
}

#[tokio::test]
async fn test_resume_from_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    // The root was crawled by an earlier run and must not be fetched again
    mount_html(&server, "/", "<p>Home</p>".to_string(), 0).await;
    mount_html(&server, "/a", "<p>A</p>".to_string(), 1).await;
    mount_html(&server, "/b", r#"<p>B</p><a href="/a">A</a>"#.to_string(), 1).await;

    let config = create_test_config(&server, dir.path(), 2);
    let previous = CrawlSnapshot {
        pending: vec![format!("{}/a", base)],
        in_progress: vec![format!("{}/b", base)],
        crawled: vec![base.clone()],
        errored: vec![],
    };
    std::fs::write(
        &config.output.checkpoint_path,
        serde_json::to_vec_pretty(&previous).unwrap(),
    )
    .unwrap();

    let coordinator = Coordinator::new(config.clone(), false).expect("Failed to create coordinator");
    assert_eq!(
        coordinator.state().status_of(&sumi_harvest::normalize(
            &base,
            &url::Url::parse(&base).unwrap(),
            &sumi_harvest::AllowedHosts::new(&config.scope.allowed_hosts),
        )
        .unwrap()),
        Some(CrawlStatus::Crawled)
    );

    let report = coordinator.run().await;
    assert_eq!(report.pages_crawled, 2);
    assert_eq!(report.counts.crawled, 3);

    let entries = read_entries(&entries_path(&config)).unwrap();
    let urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(urls.len(), 2);
    assert!(!urls.contains(&base.as_str()));
}

#[tokio::test]
async fn test_fresh_discards_previous_progress() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = server.uri();

    mount_html(&server, "/", "<p>Home</p>".to_string(), 1).await;

    let config = create_test_config(&server, dir.path(), 1);
    let previous = CrawlSnapshot {
        crawled: vec![base.clone()],
        ..Default::default()
    };
    std::fs::write(
        &config.output.checkpoint_path,
        serde_json::to_vec(&previous).unwrap(),
    )
    .unwrap();
    std::fs::write(&config.output.entries_path, "stale line\n").unwrap();

    let report = run_crawl(config.clone(), true).await.unwrap();
    assert_eq!(report.pages_crawled, 1);

    let content = std::fs::read_to_string(&config.output.entries_path).unwrap();
    assert!(!content.contains("stale line"));
    assert_eq!(read_entries(&entries_path(&config)).unwrap().len(), 1);
}

#[tokio::test]
async fn test_cyclic_site_terminates() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Every page links to every other page
    let links: String = (0..6)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect();
    mount_html(&server, "/", links.clone(), 1).await;
    for i in 0..6 {
        mount_html(&server, &format!("/p{}", i), format!(r#"<a href="/">home</a>{}"#, links), 1).await;
    }

    let config = create_test_config(&server, dir.path(), 4);
    let report = tokio::time::timeout(std::time::Duration::from_secs(30), run_crawl(config.clone(), false))
        .await
        .expect("Crawl did not terminate")
        .unwrap();

    assert_eq!(report.counts.crawled, 7);
    assert!(report.counts.is_done());
    assert_eq!(read_entries(&entries_path(&config)).unwrap().len(), 7);
}
