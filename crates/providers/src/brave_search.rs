//! Brave Web Search API client.
//!
//! Implements the `SearchProvider` collaborator contract. Transport
//! failures surface as `ResearchError` and flow through the agent's
//! classifier; the search itself is a single GET with a subscription token.

use async_trait::async_trait;
use serde::Deserialize;
use studyforge_core::error::ResearchError;
use studyforge_core::research::{SearchProvider, SearchResult};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct BraveSearch {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl BraveSearch {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ResearchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ResearchError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            client,
        })
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(
        &self,
        query: &str,
        count: usize,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<SearchResult>, ResearchError> {
        debug!(query, count, "Sending search request");

        let count_param = count.to_string();
        let request = self
            .client
            .get(&self.api_url)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", count_param.as_str())])
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(ResearchError::SearchFailed {
                    reason: "search cancelled".into(),
                });
            }
            result = request => result.map_err(|e| {
                if e.is_timeout() {
                    ResearchError::SearchFailed {
                        reason: format!("search request timed out: {e}"),
                    }
                } else {
                    ResearchError::Network(e.to_string())
                }
            })?,
        };

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::SearchFailed {
                reason: format!("search API returned status {status}: {body}"),
            });
        }

        let api_response: BraveResponse =
            response
                .json()
                .await
                .map_err(|e| ResearchError::SearchFailed {
                    reason: format!("failed to parse search response: {e}"),
                })?;

        let results = api_response
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(count)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.description.unwrap_or_default(),
                date: r.page_age,
            })
            .collect();

        Ok(results)
    }
}

// --- API response shapes ---

#[derive(Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    page_age: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_results() {
        let body = r#"{
            "web": {
                "results": [
                    {
                        "title": "Jupiter - Wikipedia",
                        "url": "https://en.wikipedia.org/wiki/Jupiter",
                        "description": "Jupiter is the fifth planet from the Sun.",
                        "page_age": "2024-01-02"
                    }
                ]
            }
        }"#;
        let parsed: BraveResponse = serde_json::from_str(body).unwrap();
        let results = parsed.web.unwrap().results;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Jupiter - Wikipedia");
        assert_eq!(results[0].page_age.as_deref(), Some("2024-01-02"));
    }

    #[test]
    fn response_tolerates_missing_web_section() {
        let parsed: BraveResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.web.is_none());
    }
}
