//! Shared scripted collaborators for agent tests.
//!
//! `SequentialMockModel` returns a queue of scripted responses; each call
//! consumes the next one. Panics if more calls are made than responses
//! provided, which turns an unexpected extra model call into a loud test
//! failure.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use studyforge_core::error::{ModelError, ResearchError};
use studyforge_core::model::{CompletionRequest, LanguageModel, SchemaRequest};
use studyforge_core::research::{ScrapeOutcome, Scraper, SearchProvider, SearchResult};

/// A mock language model that returns scripted responses in order.
pub struct SequentialMockModel {
    structured: Mutex<VecDeque<Result<serde_json::Value, ModelError>>>,
    answers: Mutex<VecDeque<Result<String, ModelError>>>,
    structured_calls: Mutex<usize>,
    answer_calls: Mutex<usize>,
}

impl SequentialMockModel {
    pub fn new() -> Self {
        Self {
            structured: Mutex::new(VecDeque::new()),
            answers: Mutex::new(VecDeque::new()),
            structured_calls: Mutex::new(0),
            answer_calls: Mutex::new(0),
        }
    }

    /// Queue a structured response.
    pub fn then_structured(self, value: serde_json::Value) -> Self {
        self.structured.lock().unwrap().push_back(Ok(value));
        self
    }

    /// Queue a structured-call failure.
    pub fn then_structured_error(self, error: ModelError) -> Self {
        self.structured.lock().unwrap().push_back(Err(error));
        self
    }

    /// Queue a streamed answer.
    pub fn then_answer(self, text: &str) -> Self {
        self.answers.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    /// Queue an answer-call failure (raised before streaming starts).
    pub fn then_answer_error(self, error: ModelError) -> Self {
        self.answers.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn structured_calls(&self) -> usize {
        *self.structured_calls.lock().unwrap()
    }

    pub fn answer_calls(&self) -> usize {
        *self.answer_calls.lock().unwrap()
    }
}

impl Default for SequentialMockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn structured(
        &self,
        _request: SchemaRequest,
    ) -> Result<serde_json::Value, ModelError> {
        *self.structured_calls.lock().unwrap() += 1;
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                panic!(
                    "SequentialMockModel: no more structured responses (call #{})",
                    self.structured_calls()
                )
            })
    }

    async fn stream_text(
        &self,
        _request: CompletionRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<String, ModelError>>, ModelError> {
        *self.answer_calls.lock().unwrap() += 1;
        let next = self.answers.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!(
                "SequentialMockModel: no more answers (call #{})",
                self.answer_calls()
            )
        });

        let text = next?;
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            // Chunked send to exercise stream assembly in consumers.
            let chars: Vec<char> = text.chars().collect();
            for chunk in chars.chunks(6) {
                if tx.send(Ok(chunk.iter().collect())).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// A search provider returning a fixed result set, or a scripted failure.
pub struct StubSearch {
    results: Vec<SearchResult>,
    error: Option<ResearchError>,
    queries: Mutex<Vec<String>>,
}

impl StubSearch {
    /// Succeed with `count` generated results per query.
    pub fn with_results(count: usize) -> Self {
        let results = (0..count)
            .map(|i| SearchResult {
                title: format!("Result {}", i + 1),
                url: format!("https://example.com/{}", i + 1),
                snippet: format!("Snippet for result {}", i + 1),
                date: None,
            })
            .collect();
        Self {
            results,
            error: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Succeed with zero results.
    pub fn empty() -> Self {
        Self::with_results(0)
    }

    /// Fail every query.
    pub fn failing(reason: &str) -> Self {
        Self {
            results: Vec::new(),
            error: Some(ResearchError::SearchFailed {
                reason: reason.to_string(),
            }),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries_seen(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(
        &self,
        query: &str,
        count: usize,
        _cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, ResearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        Ok(self.results.iter().take(count).cloned().collect())
    }
}

/// A scraper that succeeds with fixed content, or fails every URL.
pub struct StubScraper {
    content: Option<String>,
    urls: Mutex<Vec<String>>,
}

impl StubScraper {
    /// Every URL succeeds with the given content.
    pub fn succeeding(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Every URL fails.
    pub fn failing() -> Self {
        Self {
            content: None,
            urls: Mutex::new(Vec::new()),
        }
    }

    /// All URLs passed across every call, in order.
    pub fn urls_seen(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scraper for StubScraper {
    async fn scrape(&self, urls: &[String]) -> Vec<ScrapeOutcome> {
        self.urls.lock().unwrap().extend(urls.iter().cloned());
        urls.iter()
            .map(|url| match &self.content {
                Some(content) => ScrapeOutcome::ok(url, content.clone()),
                None => ScrapeOutcome::failed(url, "fetch failed"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_model_returns_in_order() {
        let model = SequentialMockModel::new()
            .then_structured(serde_json::json!({"first": true}))
            .then_structured(serde_json::json!({"second": true}));

        let request = SchemaRequest {
            completion: CompletionRequest {
                model: "mock".into(),
                messages: vec![],
                temperature: 0.0,
                max_tokens: None,
            },
            schema_name: "s".into(),
            schema: serde_json::json!({}),
        };

        let first = model.structured(request.clone()).await.unwrap();
        assert_eq!(first["first"], true);
        let second = model.structured(request).await.unwrap();
        assert_eq!(second["second"], true);
        assert_eq!(model.structured_calls(), 2);
    }

    #[tokio::test]
    async fn stub_search_records_queries() {
        let search = StubSearch::with_results(2);
        let results = search
            .search("test query", 5, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(search.queries_seen(), vec!["test query".to_string()]);
    }

    #[tokio::test]
    async fn failing_scraper_fails_every_url() {
        let scraper = StubScraper::failing();
        let outcomes = scraper
            .scrape(&["https://a.example".to_string(), "https://b.example".to_string()])
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| !o.success));
    }
}
