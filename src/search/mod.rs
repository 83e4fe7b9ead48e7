//! Search-side collaborators: query strategy, search backend and content
//! fetcher. All three are trait seams so the orchestrator can be driven by
//! real HTTP implementations in production and by mocks in tests.

mod backend;
mod fetcher;
mod strategy;

pub use backend::SearxngBackend;
pub use fetcher::HttpFetcher;
pub use strategy::{static_phrases_for_round, StaticStrategy};

use crate::core::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One result returned by a search backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Produces search phrases for a topic, adapted to the round number.
/// Early rounds favor short high-yield phrasing; later rounds broaden.
#[async_trait]
pub trait QueryStrategy: Send + Sync {
    async fn generate(&self, topic: &str, round: u32) -> Result<Vec<String>>;
}

/// Dispatches one phrase to a search service.
/// An empty result list is a valid answer, not an error.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, phrase: &str) -> Result<Vec<SearchHit>>;
}

/// Retrieves the raw body of a URL. Timeout enforcement is the fetcher's
/// responsibility, not the pipeline's.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
