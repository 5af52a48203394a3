//! Page fetching for link titles
//!
//! Implements:
//! - `TitleFetcher` trait (the network seam)
//! - `HttpTitleFetcher` backed by a blocking reqwest client
//! - `OfflineFetcher`, used when no HTTP client can be built
//! - `extract_title` over the fetched page text

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::io::Read;
use tracing::debug;

use crate::config::ParserConfig;
use crate::error::{ParseError, Result};

/// Abstract page source (HTTP, canned pages in tests, etc.).
pub trait TitleFetcher: Send + Sync {
    /// Fetch the resource at `url` as text.
    fn fetch_page(&self, url: &str) -> Result<String>;

    fn name(&self) -> &'static str {
        "fetcher"
    }

    /// Fetch `url` and pull out its `<title>`.
    fn fetch_title(&self, url: &str) -> Result<String> {
        let page = self.fetch_page(url)?;
        extract_title(&page)
            .map(str::to_string)
            .ok_or_else(|| ParseError::fetch(url, "page has no <title>...</title>"))
    }
}

/// Text between the first `<title>` and the first `</title>` after it.
pub fn extract_title(page: &str) -> Option<&str> {
    const OPEN: &str = "<title>";
    const CLOSE: &str = "</title>";

    let start = page.find(OPEN)? + OPEN.len();
    let len = page[start..].find(CLOSE)?;
    Some(&page[start..start + len])
}

fn is_text_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/") || mime.ends_with("/xml") || mime.ends_with("+xml")
}

/// Fetches pages over HTTP(S) with bounded timeouts.
#[derive(Clone, Debug)]
pub struct HttpTitleFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpTitleFetcher {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

impl TitleFetcher for HttpTitleFetcher {
    fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?;
        debug!(url, status = %response.status(), "fetched page");

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !is_text_content_type(content_type) {
                return Err(ParseError::fetch(
                    url,
                    format!("non-text content type {content_type}"),
                ));
            }
        }

        let mut body = Vec::new();
        response
            .take(self.max_body_bytes as u64)
            .read_to_end(&mut body)
            .map_err(|e| ParseError::fetch(url, format!("failed to read body: {e}")))?;

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Fetcher that never reaches the network; every title stays empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineFetcher;

impl TitleFetcher for OfflineFetcher {
    fn fetch_page(&self, url: &str) -> Result<String> {
        Err(ParseError::fetch(url, "network access disabled"))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
