//! Research handlers — bounded wrappers around the search and scrape
//! collaborators.
//!
//! The policy is not trusted to self-limit research breadth; these handlers
//! enforce the hard resource caps deterministically regardless of what was
//! proposed.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use studyforge_core::error::{Error, Result};
use studyforge_core::research::{QueryResult, ScrapedPage, Scraper, SearchProvider};

use crate::context::ExecutionContext;

/// Results requested per search query.
pub const SEARCH_RESULT_COUNT: usize = 5;

/// At most this many URLs are attempted per scrape call; excess URLs are
/// silently dropped from the call.
pub const MAX_URLS_PER_SCRAPE: usize = 4;

/// Total successfully scraped pages across a run.
pub const MAX_SCRAPED_PAGES_PER_RUN: usize = 8;

/// Per-page content cap, in characters.
pub const MAX_PAGE_CONTENT_CHARS: usize = 10_000;

/// Appended whenever a page's content was cut at the cap.
pub const TRUNCATION_MARKER: &str = "\n\n[... Content truncated to prevent token overflow ...]";

/// Run one search query and append the results to the context.
///
/// A blank query is a caller-contract violation (a policy/schema mismatch,
/// not a transient condition) and propagates immediately.
pub async fn handle_search(
    context: &mut ExecutionContext,
    search: &dyn SearchProvider,
    query: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidAction(
            "search action requires a non-empty query".into(),
        ));
    }

    debug!(query, "Running search");
    let results = search.search(query, SEARCH_RESULT_COUNT, cancel).await?;
    debug!(query, count = results.len(), "Search completed");

    context.record_search(QueryResult {
        query: query.to_string(),
        results,
        timestamp: Utc::now(),
    });

    Ok(())
}

/// Scrape a batch of URLs, applying the three hard caps in order:
/// per-call URL cap, session page cap, per-page truncation.
///
/// Only pages the scraper reports as successful are appended; failures are
/// logged and dropped. A batch where every page fails returns normally with
/// zero new entries.
pub async fn handle_scrape(
    context: &mut ExecutionContext,
    scraper: &dyn Scraper,
    urls: &[String],
) -> Result<()> {
    if context.scraped_page_count() >= MAX_SCRAPED_PAGES_PER_RUN {
        debug!(
            pages = context.scraped_page_count(),
            "Session scrape cap reached; skipping scrape call"
        );
        return Ok(());
    }

    let batch: Vec<String> = urls.iter().take(MAX_URLS_PER_SCRAPE).cloned().collect();
    if batch.len() < urls.len() {
        debug!(
            requested = urls.len(),
            attempted = batch.len(),
            "Dropping excess URLs from scrape call"
        );
    }

    let outcomes = scraper.scrape(&batch).await;

    let mut appended = 0usize;
    for outcome in outcomes {
        if context.scraped_page_count() >= MAX_SCRAPED_PAGES_PER_RUN {
            break;
        }
        if !outcome.success {
            warn!(
                url = %outcome.url,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Scrape failed for page; dropping"
            );
            continue;
        }
        let Some(content) = outcome.content else {
            warn!(url = %outcome.url, "Scraper reported success without content; dropping");
            continue;
        };

        context.record_page(ScrapedPage {
            url: outcome.url,
            content: truncate_content(&content),
            metadata: None,
            timestamp: Utc::now(),
        });
        appended += 1;
    }

    debug!(
        appended,
        total = context.scraped_page_count(),
        "Scrape call completed"
    );
    Ok(())
}

/// Cap page content at exactly [`MAX_PAGE_CONTENT_CHARS`] characters,
/// appending the truncation marker when the cap was hit.
fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_PAGE_CONTENT_CHARS {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(MAX_PAGE_CONTENT_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubScraper, StubSearch};

    fn conversational_ctx() -> ExecutionContext {
        ExecutionContext::conversational(vec![])
    }

    #[tokio::test]
    async fn search_appends_query_result() {
        let mut ctx = conversational_ctx();
        let search = StubSearch::with_results(3);
        handle_search(&mut ctx, &search, "jupiter moons", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ctx.search_history().len(), 1);
        assert_eq!(ctx.search_history()[0].query, "jupiter moons");
        assert_eq!(ctx.search_history()[0].results.len(), 3);
    }

    #[tokio::test]
    async fn blank_query_propagates_contract_violation() {
        let mut ctx = conversational_ctx();
        let search = StubSearch::with_results(1);
        let err = handle_search(&mut ctx, &search, "   ", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAction(_)));
        assert!(ctx.search_history().is_empty());
    }

    #[tokio::test]
    async fn scrape_caps_urls_per_call() {
        let mut ctx = conversational_ctx();
        let scraper = StubScraper::succeeding("short page text");
        let urls: Vec<String> = (0..7).map(|i| format!("https://example.com/{i}")).collect();

        handle_scrape(&mut ctx, &scraper, &urls).await.unwrap();

        assert_eq!(ctx.scraped_page_count(), MAX_URLS_PER_SCRAPE);
        assert_eq!(scraper.urls_seen().len(), MAX_URLS_PER_SCRAPE);
    }

    #[tokio::test]
    async fn scrape_session_cap_holds() {
        let mut ctx = conversational_ctx();
        let scraper = StubScraper::succeeding("text");

        for round in 0..3 {
            let urls: Vec<String> = (0..4)
                .map(|i| format!("https://example.com/{round}/{i}"))
                .collect();
            handle_scrape(&mut ctx, &scraper, &urls).await.unwrap();
        }

        assert_eq!(ctx.scraped_page_count(), MAX_SCRAPED_PAGES_PER_RUN);
    }

    #[tokio::test]
    async fn scrape_at_cap_is_noop_without_error() {
        let mut ctx = conversational_ctx();
        let scraper = StubScraper::succeeding("text");

        for round in 0..2 {
            let urls: Vec<String> = (0..4)
                .map(|i| format!("https://example.com/{round}/{i}"))
                .collect();
            handle_scrape(&mut ctx, &scraper, &urls).await.unwrap();
        }
        assert_eq!(ctx.scraped_page_count(), MAX_SCRAPED_PAGES_PER_RUN);

        let calls_before = scraper.urls_seen().len();
        handle_scrape(&mut ctx, &scraper, &["https://example.com/extra".to_string()])
            .await
            .unwrap();

        assert_eq!(ctx.scraped_page_count(), MAX_SCRAPED_PAGES_PER_RUN);
        // No-op: the scraper was not even called
        assert_eq!(scraper.urls_seen().len(), calls_before);
    }

    #[tokio::test]
    async fn all_failures_is_not_an_error() {
        let mut ctx = conversational_ctx();
        let scraper = StubScraper::failing();
        let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];

        handle_scrape(&mut ctx, &scraper, &urls).await.unwrap();
        assert_eq!(ctx.scraped_page_count(), 0);
    }

    #[tokio::test]
    async fn oversized_page_truncated_exactly() {
        let mut ctx = conversational_ctx();
        let long = "x".repeat(MAX_PAGE_CONTENT_CHARS + 500);
        let scraper = StubScraper::succeeding(&long);

        handle_scrape(&mut ctx, &scraper, &["https://big.example".to_string()])
            .await
            .unwrap();

        let stored = &ctx.scraped_content()[0].content;
        let expected: String = long.chars().take(MAX_PAGE_CONTENT_CHARS).collect();
        assert_eq!(*stored, format!("{expected}{TRUNCATION_MARKER}"));
    }

    #[tokio::test]
    async fn page_at_cap_stored_verbatim() {
        let mut ctx = conversational_ctx();
        let exact = "y".repeat(MAX_PAGE_CONTENT_CHARS);
        let scraper = StubScraper::succeeding(&exact);

        handle_scrape(&mut ctx, &scraper, &["https://exact.example".to_string()])
            .await
            .unwrap();

        assert_eq!(ctx.scraped_content()[0].content, exact);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let long = "é".repeat(MAX_PAGE_CONTENT_CHARS + 1);
        let truncated = truncate_content(&long);
        assert!(truncated.starts_with('é'));
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        let body = truncated.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(body.chars().count(), MAX_PAGE_CONTENT_CHARS);
    }
}
