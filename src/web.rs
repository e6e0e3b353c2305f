//! Webpage fetching and HTML conversion.
//!
//! The [`Crawler`] trait hides the HTTP layer from the ingestion pipeline so
//! tests can swap in canned pages. [`HttpCrawler`] is the real
//! implementation: plain GET with a bounded timeout, HTML to markdown via
//! htmd, title extraction via a `<title>` selector.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{Error, Result};

/// A fetched and converted page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// `<title>` text, or the request URL when the page has none.
    pub title: String,
    /// Raw response body.
    pub html: String,
    /// Markdown rendering of the body; scripts and styles do not survive
    /// the conversion.
    pub markdown: String,
}

#[async_trait]
pub trait Crawler: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpCrawler {
    client: reqwest::Client,
}

impl HttpCrawler {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Crawler for HttpCrawler {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Fetch(format!("{url} returned HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("{url}: failed to read body: {e}")))?;

        let markdown = html_to_markdown(&html)?;
        let title = extract_title(&html).unwrap_or_else(|| url.to_string());
        Ok(FetchedPage {
            title,
            html,
            markdown,
        })
    }
}

/// Convert an HTML document to markdown.
pub fn html_to_markdown(html: &str) -> Result<String> {
    htmd::convert(html).map_err(|e| Error::Fetch(format!("HTML conversion failed: {e}")))
}

/// Extract the trimmed `<title>` text, if the page has a non-empty one.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Derive a markdown filename from a URL's host and path.
///
/// Everything outside `[a-zA-Z0-9_.-]` becomes an underscore, so the result
/// is safe as a single path component on any filesystem.
pub fn url_to_filename(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::Fetch(format!("invalid URL {url}: {e}")))?;
    let raw = format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path());
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.ends_with(".md") {
        name.push_str(".md");
    }
    Ok(name)
}
