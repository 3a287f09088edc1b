//! Retrieval seams: search providers, page fetchers, and the source finder.
//!
//! Concrete HTTP implementations live in `delve-tools`; the core only sees
//! these traits, which keeps the orchestrator testable without a network.

use super::types::{FetchedPage, SearchHit, SearchQuery};
use crate::config::RetryConfig;
use crate::error::{FetchError, SearchError};
use crate::retry::with_retry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Return up to `max_results` hits for `query`, best first.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Retrieves a URL and extracts its readable content.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Wraps a [`SearchProvider`] so that a search never fails.
///
/// Transient errors are retried; anything still failing, timing out, or
/// returning nothing becomes an empty candidate list.
pub struct SourceFinder {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    timeout: Duration,
    retry: RetryConfig,
}

impl SourceFinder {
    pub fn new(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            max_results,
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Candidate URLs for `query`, at most `max_results`, in provider order.
    pub async fn find(&self, query: &SearchQuery) -> Vec<String> {
        self.find_hits(query)
            .await
            .into_iter()
            .map(|hit| hit.url)
            .collect()
    }

    /// Like [`find`](Self::find) but keeps titles.
    pub async fn find_hits(&self, query: &SearchQuery) -> Vec<SearchHit> {
        let provider = self.provider.as_ref();
        let timeout = self.timeout;
        let max_results = self.max_results;

        let result = with_retry(&self.retry, move || async move {
            match tokio::time::timeout(timeout, provider.search(query.as_str(), max_results)).await
            {
                Ok(result) => result,
                Err(_) => Err(SearchError::Timeout {
                    timeout_secs: timeout.as_secs(),
                }),
            }
        })
        .await;

        match result {
            Ok(mut hits) => {
                hits.truncate(self.max_results);
                if hits.is_empty() {
                    warn!(query = %query, provider = provider.name(), "Search returned no results");
                } else {
                    debug!(query = %query, count = hits.len(), "Search returned candidates");
                }
                hits
            }
            Err(e) => {
                warn!(query = %query, provider = provider.name(), error = %e, "Search failed");
                Vec::new()
            }
        }
    }
}
