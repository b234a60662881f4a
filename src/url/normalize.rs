use crate::url::AllowedHosts;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// A canonical absolute URL used as the identity of a page
///
/// Two links that normalize to the same string are the same page for every
/// crawl purpose. Values are only produced by [`normalize`] (or restored from a
/// checkpoint the crawler itself wrote).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    /// Wraps a string that was normalized by an earlier run
    pub(crate) fn from_trusted(url: String) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a discovered link according to Sumi-Harvest's rules
///
/// # Normalization Steps
///
/// 1. Resolve `raw` against `base` (relative links, `..` and `.` segments)
/// 2. Reject anything that is not `http` or `https` (`mailto:`, `tel:`, ...)
/// 3. Reject hosts that are not exactly one of `allowed`
/// 4. Drop the fragment and any trailing slash of the path
/// 5. Reject paths that repeat a segment (`/a/b/a/b`), which is how crawler
///    traps usually show up
///
/// The query string is kept. A non-default port is kept.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::{normalize, AllowedHosts};
/// use url::Url;
///
/// let allowed = AllowedHosts::new(["example.org"]);
/// let base = Url::parse("https://example.org/").unwrap();
///
/// let url = normalize("/about#team", &base, &allowed).unwrap();
/// assert_eq!(url.as_str(), "https://example.org/about");
///
/// assert!(normalize("mailto:x@example.org", &base, &allowed).is_none());
/// ```
pub fn normalize(raw: &str, base: &Url, allowed: &AllowedHosts) -> Option<NormalizedUrl> {
    let resolved = base.join(raw.trim()).ok()?;

    let scheme = resolved.scheme();
    if scheme != "http" && scheme != "https" {
        return None;
    }

    let host = resolved.host_str()?;
    if !allowed.contains(host) {
        return None;
    }

    let path = resolved.path().trim_end_matches('/');
    if has_repeated_segment(path) {
        return None;
    }

    let mut normalized = format!("{}://{}", scheme, host);
    if let Some(port) = resolved.port() {
        normalized.push_str(&format!(":{}", port));
    }
    normalized.push_str(path);
    if let Some(query) = resolved.query() {
        normalized.push('?');
        normalized.push_str(query);
    }

    Some(NormalizedUrl(normalized))
}

/// Returns true if any non-empty path segment occurs more than once
///
/// ```
/// use sumi_harvest::url::has_repeated_segment;
///
/// assert!(has_repeated_segment("/docs/2020/docs/2020"));
/// assert!(!has_repeated_segment("/docs/2020/news"));
/// ```
pub fn has_repeated_segment(path: &str) -> bool {
    let mut seen = HashSet::new();
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .any(|segment| !seen.insert(segment))
}
