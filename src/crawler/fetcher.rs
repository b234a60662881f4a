//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - GET requests, following redirects only within the allowed hosts
//! - Rejecting non-2xx responses and non-text content before the body is read
//! - Error classification for logging

use crate::config::UserAgentConfig;
use crate::crawler::extractor::unsupported_content_type;
use crate::url::AllowedHosts;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for one fetch
const MAX_REDIRECTS: usize = 10;

/// Why a page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body read failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Status { status: StatusCode },

    #[error("Redirected out of scope to {final_url}")]
    RedirectedOutOfScope { final_url: String },

    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },
}

impl FetchError {
    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(e) if e.is_timeout() => "timeout",
            FetchError::Transport(e) if e.is_connect() => "connect",
            FetchError::Transport(_) => "transport",
            FetchError::Status { .. } => "status",
            FetchError::RedirectedOutOfScope { .. } => "redirect",
            FetchError::UnsupportedContentType { .. } => "content-type",
        }
    }
}

/// A successful (2xx) response
#[derive(Debug)]
pub struct FetchedPage {
    /// URL after redirects; relative links resolve against it
    pub final_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound for a whole request, body included
/// * `allowed` - Hosts redirects may lead to; a hop to any other host is not
///   followed and the redirect response is returned as is
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::UserAgentConfig;
/// use sumi_harvest::crawler::build_http_client;
/// use sumi_harvest::AllowedHosts;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: Some("https://example.com/about".to_string()),
/// };
///
/// let allowed = AllowedHosts::new(["example.com"]);
/// let client = build_http_client(&config, Duration::from_secs(30), &allowed).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
    allowed: &AllowedHosts,
) -> Result<Client, reqwest::Error> {
    let allowed = allowed.clone();
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !allowed.allows(attempt.url()) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(policy)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page with a single GET request
///
/// # Outcomes
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `Ok(FetchedPage)` |
/// | Redirect to a host outside `allowed` (never requested) | `FetchError::RedirectedOutOfScope` |
/// | Any other non-2xx status | `FetchError::Status` |
/// | `Content-Type` neither text nor HTML (body not downloaded) | `FetchError::UnsupportedContentType` |
/// | Timeout, connection or TLS failure, too many redirects | `FetchError::Transport` |
///
/// The client must come from [`build_http_client`] with the same allow-list.
/// No retries are made; a failed URL is recorded as errored by the caller.
pub async fn fetch_page(
    client: &Client,
    url: &str,
    allowed: &AllowedHosts,
) -> Result<FetchedPage, FetchError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    let final_url = response.url().clone();

    if !allowed.allows(&final_url) {
        return Err(FetchError::RedirectedOutOfScope {
            final_url: final_url.to_string(),
        });
    }

    if status.is_redirection() {
        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| final_url.join(location).ok());
        if let Some(target) = target.filter(|target| !allowed.allows(target)) {
            return Err(FetchError::RedirectedOutOfScope {
                final_url: target.to_string(),
            });
        }
    }

    if !status.is_success() {
        return Err(FetchError::Status { status });
    }

    if let Some(content_type) = unsupported_content_type(response.headers()) {
        return Err(FetchError::UnsupportedContentType { content_type });
    }

    let headers = response.headers().clone();
    let body = response.text().await?;

    Ok(FetchedPage {
        final_url,
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: Some("https://example.com/about".to_string()),
        }
    }

    fn client_for(allowed: &AllowedHosts) -> Client {
        build_http_client(&create_test_config(), Duration::from_secs(5), allowed).unwrap()
    }

    fn allowed_for(server: &MockServer) -> AllowedHosts {
        let url = Url::parse(&server.uri()).unwrap();
        AllowedHosts::new([url.host_str().unwrap()])
    }

    #[test]
    fn test_build_http_client() {
        let allowed = AllowedHosts::new(["example.com"]);
        let client = build_http_client(&create_test_config(), Duration::from_secs(1), &allowed);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header(
                "user-agent",
                "TestCrawler/1.0 (+https://example.com/about)",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<p>hello</p>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let allowed = allowed_for(&server);
        let page = fetch_page(&client_for(&allowed), &format!("{}/page", server.uri()), &allowed)
            .await
            .unwrap();

        assert_eq!(page.status, StatusCode::OK);
        assert_eq!(page.body, "<p>hello</p>");
        assert_eq!(page.final_url.path(), "/page");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let allowed = allowed_for(&server);
        let result =
            fetch_page(&client_for(&allowed), &format!("{}/missing", server.uri()), &allowed).await;

        match result {
            Err(FetchError::Status { status }) => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_follows_redirect_within_scope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/new/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let allowed = allowed_for(&server);
        let page = fetch_page(&client_for(&allowed), &format!("{}/old", server.uri()), &allowed)
            .await
            .unwrap();

        assert_eq!(page.final_url.path(), "/new/");
        assert_eq!(page.body, "moved");
    }

    #[tokio::test]
    async fn test_fetch_does_not_follow_redirect_off_allowed_hosts() {
        let server = MockServer::start().await;
        let elsewhere = MockServer::start().await;
        let elsewhere_port = Url::parse(&elsewhere.uri()).unwrap().port().unwrap();
        let target = format!("http://localhost:{}/landing", elsewhere_port);

        Mock::given(method("GET"))
            .and(path("/leave"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", target.as_str()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("off-site"))
            .expect(0)
            .mount(&elsewhere)
            .await;

        // Only 127.0.0.1 is allowed; the redirect names localhost
        let allowed = allowed_for(&server);
        let result =
            fetch_page(&client_for(&allowed), &format!("{}/leave", server.uri()), &allowed).await;

        match result {
            Err(FetchError::RedirectedOutOfScope { final_url }) => assert_eq!(final_url, target),
            other => panic!("expected out-of-scope redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_redirect_loop_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let allowed = allowed_for(&server);
        let result =
            fetch_page(&client_for(&allowed), &format!("{}/loop", server.uri()), &allowed).await;

        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_binary_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46, 0x00, 0xff]),
            )
            .mount(&server)
            .await;

        let allowed = allowed_for(&server);
        let result =
            fetch_page(&client_for(&allowed), &format!("{}/report.pdf", server.uri()), &allowed)
                .await;

        match result {
            Err(err @ FetchError::UnsupportedContentType { .. }) => {
                assert_eq!(err.kind(), "content-type");
                assert!(err.to_string().contains("application/pdf"));
            }
            other => panic!("expected unsupported content type, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_outside_allowed_hosts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/away"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .mount(&server)
            .await;

        // The server host is not on the allow-list, so the final URL is out of scope
        let allowed = AllowedHosts::new(["example.org"]);
        let result =
            fetch_page(&client_for(&allowed), &format!("{}/away", server.uri()), &allowed).await;

        assert!(matches!(
            result,
            Err(FetchError::RedirectedOutOfScope { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transport_error() {
        let allowed = AllowedHosts::new(["127.0.0.1"]);

        let result = fetch_page(&client_for(&allowed), "http://127.0.0.1:1/", &allowed).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
