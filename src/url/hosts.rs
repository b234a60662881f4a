use std::collections::HashSet;
use url::Url;

/// The set of hosts a crawl may visit
///
/// Matching is exact and case-insensitive: `example.org` does not admit
/// `www.example.org` or `badexample.org`.
#[derive(Debug, Clone, Default)]
pub struct AllowedHosts {
    hosts: HashSet<String>,
}

impl AllowedHosts {
    /// Builds the allow-list, lowercasing and trimming each host
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Returns true if `host` is exactly one of the allowed hosts
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_lowercase())
    }

    /// Returns true if the URL's host is allowed
    pub fn allows(&self, url: &Url) -> bool {
        url.host_str().map(|h| self.contains(h)).unwrap_or(false)
    }
}
