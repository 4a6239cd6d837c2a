//! HTTP page scraper with readable-text extraction.
//!
//! Fetches pages with a browser-like User-Agent, detects HTML, and extracts
//! readable text via `html2text` with a tag-strip fallback. Per-URL failures
//! are captured in the batch outcome, never raised; the scrape contract is
//! that a batch call always returns, even if every page fails.

use async_trait::async_trait;
use studyforge_core::error::ResearchError;
use studyforge_core::research::{ScrapeOutcome, Scraper};
use tracing::{debug, warn};

pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ResearchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .default_headers({
                use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
                let mut h = HeaderMap::new();
                h.insert(
                    ACCEPT,
                    HeaderValue::from_static(
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    ),
                );
                h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
                h
            })
            .build()
            .map_err(|e| ResearchError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn fetch_one(&self, url: &str) -> ScrapeOutcome {
        debug!(url, "Fetching page");

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "Page fetch failed");
                return ScrapeOutcome::failed(url, e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Page returned error status");
            return ScrapeOutcome::failed(url, format!("HTTP status {}", status.as_u16()));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url, error = %e, "Failed to read page body");
                return ScrapeOutcome::failed(url, e.to_string());
            }
        };

        let text = if looks_like_html(&body) {
            html2text::from_read(body.as_bytes(), 80)
                .unwrap_or_else(|_| strip_html_tags(&body))
        } else {
            body
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return ScrapeOutcome::failed(url, "page yielded no readable text");
        }

        ScrapeOutcome::ok(url, text)
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, urls: &[String]) -> Vec<ScrapeOutcome> {
        let fetches = urls.iter().map(|url| self.fetch_one(url));
        futures::future::join_all(fetches).await
    }
}

/// Whether the body needs readable-text extraction.
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// Crude tag removal, used only when `html2text` fails on a page.
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_html_documents() {
        assert!(looks_like_html("<!DOCTYPE html><html><body>x</body></html>"));
        assert!(looks_like_html(
            "  <html lang=\"en\"><head><title>t</title></head></html>"
        ));
        assert!(!looks_like_html("plain text, no markup"));
        assert!(!looks_like_html("{\"json\": true}"));
    }

    #[test]
    fn strip_tags_removes_markup() {
        let html = "<p>Hello <b>world</b></p>\n<script>ignored()</script>";
        let text = strip_html_tags(html);
        assert!(text.contains("Hello world"));
        assert!(!text.contains('<'));
    }

    #[tokio::test]
    async fn unreachable_url_yields_failed_outcome() {
        let scraper = HttpScraper::new(1, "test-agent").unwrap();
        let outcomes = scraper
            .scrape(&["http://127.0.0.1:9/unreachable".to_string()])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.is_some());
    }
}
