//! Page content extraction
//!
//! This module turns one fetched HTML page into:
//! - Cleaned visible text (tables, images and scripts removed)
//! - One row-pipe text block per table
//! - Absolute image references
//! - Attachment links (documents such as `.pdf`)
//! - Normalized outbound links for the crawl frontier

use crate::url::{normalize, AllowedHosts, NormalizedUrl};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Why a fetched page could not be turned into an entry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Malformed page: {0}")]
    Malformed(String),

    #[error("Invalid page URL {url}: {reason}")]
    InvalidPageUrl { url: String, reason: String },
}

/// Settings the extractor needs from the crawl configuration
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub allowed_hosts: AllowedHosts,
    /// Lowercase extensions without the leading dot
    pub attachment_extensions: Vec<String>,
}

impl ExtractOptions {
    pub fn new<I, S>(allowed_hosts: AllowedHosts, attachment_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts,
            attachment_extensions: attachment_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub text: String,
    pub tables: Vec<String>,
    pub images: Vec<String>,
    pub attachments: Vec<String>,
    /// Normalized in-scope links, deduplicated, in document order
    pub links: Vec<NormalizedUrl>,
}

/// Elements whose text is never visible
const HIDDEN_TAGS: &str = "script, style, noscript, template";

/// Bytes inspected when sniffing for binary content
const SNIFF_LEN: usize = 1024;

/// Extracts text, tables, images, attachments and links from a page
///
/// # Arguments
///
/// * `page_url` - URL the body was served from; relative references resolve against it
/// * `body` - The decoded response body
/// * `headers` - Response headers, consulted for `Content-Type`
/// * `options` - Allowed hosts and attachment extensions
///
/// # Returns
///
/// * `Ok(ExtractedPage)` - The page content
/// * `Err(ExtractError::UnsupportedContentType)` - Neither text nor HTML
/// * `Err(ExtractError::Malformed)` - The body is binary data
/// * `Err(ExtractError::InvalidPageUrl)` - `page_url` is not an absolute URL
pub fn extract(
    page_url: &str,
    body: &str,
    headers: &HeaderMap,
    options: &ExtractOptions,
) -> Result<ExtractedPage, ExtractError> {
    check_content_type(headers)?;

    let page_url = Url::parse(page_url).map_err(|e| ExtractError::InvalidPageUrl {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;

    let sniff = &body.as_bytes()[..body.len().min(SNIFF_LEN)];
    if sniff.contains(&0) {
        return Err(ExtractError::Malformed(
            "body contains binary data".to_string(),
        ));
    }

    let mut document = Html::parse_document(body);

    // Links and attachments are read before anything is removed so that
    // anchors inside tables are still discovered.
    let links = extract_links(&document, &page_url, &options.allowed_hosts);
    let attachments = extract_attachments(&document, &page_url, &options.attachment_extensions);

    let tables = remove_tables(&mut document);
    let images = remove_images(&mut document, &page_url);
    remove_matching(&mut document, HIDDEN_TAGS);

    let raw_text: String = document.root_element().text().collect();

    Ok(ExtractedPage {
        text: clean_text(&raw_text),
        tables,
        images,
        attachments,
        links,
    })
}

/// Rejects responses that are neither text nor HTML
fn check_content_type(headers: &HeaderMap) -> Result<(), ExtractError> {
    match unsupported_content_type(headers) {
        Some(mime) => Err(ExtractError::UnsupportedContentType(mime)),
        None => Ok(()),
    }
}

/// Returns the MIME type if the response is neither text nor HTML
///
/// A missing header is accepted; servers omit it often enough for HTML pages.
pub(crate) fn unsupported_content_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?;

    let content_type = value.to_str().unwrap_or("").to_ascii_lowercase();
    let mime = content_type.split(';').next().unwrap_or("").trim();

    if mime.is_empty() || mime.starts_with("text/") || mime == "application/xhtml+xml" {
        None
    } else {
        Some(mime.to_string())
    }
}

/// Trims every line and drops blank ones
///
/// ```
/// use sumi_harvest::crawler::clean_text;
///
/// assert_eq!(clean_text("  Hello \n\n \t\n  world  "), "Hello\nworld");
/// ```
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn is_element(node: &Node, name: &str) -> bool {
    node.as_element()
        .map(|element| element.name() == name)
        .unwrap_or(false)
}

fn extract_links(document: &Html, page_url: &Url, allowed: &AllowedHosts) -> Vec<NormalizedUrl> {
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| normalize(href, page_url, allowed))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn extract_attachments(document: &Html, page_url: &Url, extensions: &[String]) -> Vec<String> {
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_http(href, page_url))
        .filter(|url| has_extension(url, extensions))
        .map(|url| url.to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn resolve_http(reference: &str, page_url: &Url) -> Option<Url> {
    let resolved = page_url.join(reference.trim()).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

fn has_extension(url: &Url, extensions: &[String]) -> bool {
    let path = url.path().to_lowercase();
    extensions
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext)))
}

/// Renders every outermost table and removes it from the document
///
/// Nested tables are rendered as part of their outer table's cells.
fn remove_tables(document: &mut Html) -> Vec<String> {
    let (Some(tables), Some(rows)) = (selector("table"), selector("tr")) else {
        return Vec::new();
    };
    let mut rendered = Vec::new();
    let mut ids = Vec::new();

    for table in document.select(&tables) {
        if table.ancestors().any(|node| is_element(node.value(), "table")) {
            continue;
        }
        if let Some(text) = render_table(table, &rows) {
            rendered.push(text);
        }
        ids.push(table.id());
    }

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    rendered
}

/// Renders a table as `| a | b |` rows, with a separator after the first row
fn render_table(table: ElementRef<'_>, rows: &Selector) -> Option<String> {
    let mut lines = Vec::new();

    for row in table.select(rows) {
        let owner = row.ancestors().find(|node| is_element(node.value(), "table"));
        if owner.map(|node| node.id()) != Some(table.id()) {
            continue;
        }

        let cells: Vec<String> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| matches!(cell.value().name(), "th" | "td"))
            .map(cell_text)
            .collect();

        if cells.is_empty() {
            continue;
        }

        let is_header = lines.is_empty();
        lines.push(format!("| {} |", cells.join(" | ")));
        if is_header {
            lines.push(format!("|{}", " --- |".repeat(cells.len())));
        }
    }

    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

/// Collects absolute image sources and removes every image element
fn remove_images(document: &mut Html, page_url: &Url) -> Vec<String> {
    let Some(img_selector) = selector("img") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    let mut ids = Vec::new();

    for img in document.select(&img_selector) {
        ids.push(img.id());
        let src = img
            .value()
            .attr("src")
            .and_then(|src| resolve_http(src, page_url));
        if let Some(src) = src {
            let src = src.to_string();
            if seen.insert(src.clone()) {
                images.push(src);
            }
        }
    }

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    images
}

fn remove_matching(document: &mut Html, css: &str) {
    let Some(hidden) = selector(css) else {
        return;
    };
    let ids: Vec<_> = document.select(&hidden).map(|e| e.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}
