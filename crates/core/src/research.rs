//! Research collaborator contracts — web search and page scraping.
//!
//! The mechanics of the providers are not part of the core; only these
//! contracts are. Implementations live in `studyforge-providers`, and the
//! agent crate supplies scripted stubs for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ResearchError;

/// One hit from the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,

    /// Publication date, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A completed search query and its results, as recorded in the execution
/// context. Append-only history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub timestamp: DateTime<Utc>,
}

/// A successfully scraped page, as recorded in the execution context.
/// Append-only history entry; `content` is already truncated by the
/// research handler before it gets here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,

    pub timestamp: DateTime<Utc>,
}

/// Per-URL result of a scrape batch. Partial failure within a batch is
/// expected and non-fatal; the handler keeps successes and drops failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub url: String,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeOutcome {
    /// A successful fetch with extracted text.
    pub fn ok(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: true,
            content: Some(content.into()),
            error: None,
        }
    }

    /// A failed fetch with the reason.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }
}

/// The web search collaborator.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "brave").
    fn name(&self) -> &str;

    /// Run one query, returning up to `count` results. Failures surface as
    /// `ResearchError` and flow through the agent's classifier.
    async fn search(
        &self,
        query: &str,
        count: usize,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<SearchResult>, ResearchError>;
}

/// The page scraping collaborator.
///
/// The batch call itself never fails: every URL yields an outcome, and a
/// batch where every page fails is a normal empty-ish result, not an error.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, urls: &[String]) -> Vec<ScrapeOutcome>;
}
