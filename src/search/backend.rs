//! SearxNG-backed search implementation (JSON API).

use super::{SearchBackend, SearchHit};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngHit>,
}

#[derive(Debug, Deserialize)]
struct SearxngHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Search backend talking to a SearxNG instance's JSON API.
#[derive(Clone)]
pub struct SearxngBackend {
    client: Client,
    base_url: String,
    max_results: usize,
}

impl SearxngBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Initialization(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.search_backend_url.trim_end_matches('/').to_string(),
            max_results: config.max_results_per_phrase,
        })
    }

    /// Reuses an existing client (shared with the fetcher).
    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.search_backend_url.trim_end_matches('/').to_string(),
            max_results: config.max_results_per_phrase,
        }
    }
}

#[async_trait]
impl SearchBackend for SearxngBackend {
    async fn search(&self, phrase: &str) -> Result<Vec<SearchHit>> {
        let url = format!("{}/search", self.base_url);
        tracing::debug!(target: "search_task", "Dispatching phrase to {}: {}", url, phrase);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", phrase),
                ("format", "json"),
                ("categories", "general"),
                ("pageno", "1"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "search backend returned HTTP {} for phrase '{}'",
                status, phrase
            )));
        }

        let payload: SearxngResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("search response decode failed: {}", e)))?;

        let hits: Vec<SearchHit> = payload
            .results
            .into_iter()
            .take(self.max_results)
            .map(|hit| SearchHit {
                title: hit.title,
                url: hit.url,
                snippet: hit.content,
            })
            .collect();

        tracing::debug!(target: "search_task",
            "Phrase '{}' returned {} results.", phrase, hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_decoding_tolerates_missing_fields() {
        let raw = r#"{"results": [{"url": "https://acme.com/team"}, {"title": "Acme", "content": "jane@acme.com"}]}"#;
        let parsed: SearxngResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].url, "https://acme.com/team");
        assert!(parsed.results[0].title.is_empty());
        assert_eq!(parsed.results[1].content, "jane@acme.com");
    }

    #[test]
    fn empty_payload_is_zero_results() {
        let parsed: SearxngResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }
}
