//! Web research tools.
//!
//! - `web_search`: candidate URLs for a query.
//! - `web_fetch`: a page's title, readable text and paragraphs.
//! - `chunked_fetch`: a page split into token-budgeted chunks.
//! - `research`: the full pipeline for one question, into the session dump.

use crate::chunked::fetch_and_chunk;
use crate::registry::{Tool, optional_usize, required_str};
use async_trait::async_trait;
use delve_core::chunker::TextChunker;
use delve_core::error::ToolError;
use delve_core::research::{
    PageFetcher, ResearchOrchestrator, ResearchQuestion, ResearchSession, SearchProvider,
};
use delve_core::types::ToolOutput;
use std::sync::Arc;
use std::time::Duration;

const MAX_SEARCH_RESULTS: usize = 10;

// ---------------------------------------------------------------------------
// WebSearchTool
// ---------------------------------------------------------------------------

/// Search the web through the configured [`SearchProvider`].
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    default_max_results: usize,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>, default_max_results: usize) -> Self {
        Self {
            provider,
            default_max_results,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for a query. Returns result URLs with titles, best first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (max: 10)",
                    "default": self.default_max_results
                }
            },
            "required": ["query"]
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = required_str(self.name(), &args, "query")?;
        let max_results = optional_usize(&args, "max_results")
            .unwrap_or(self.default_max_results)
            .min(MAX_SEARCH_RESULTS);

        let hits = self
            .provider
            .search(query, max_results)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: self.name().to_string(),
                message: e.to_string(),
            })?;

        Ok(ToolOutput::SearchResults {
            query: query.to_string(),
            hits: hits.into_iter().take(max_results).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// WebFetchTool
// ---------------------------------------------------------------------------

/// Fetch a URL and extract its readable content.
pub struct WebFetchTool {
    fetcher: Arc<dyn PageFetcher>,
}

impl WebFetchTool {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page and extract its title, readable text, and paragraphs. \
         Only http and https pages are supported; PDF and office documents are rejected."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let url = required_str(self.name(), &args, "url")?;
        let page = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: self.name().to_string(),
                message: e.to_string(),
            })?;
        Ok(ToolOutput::Page { page })
    }
}

// ---------------------------------------------------------------------------
// ChunkedFetchTool
// ---------------------------------------------------------------------------

/// Fetch a URL and return its content in token-budgeted chunks.
pub struct ChunkedFetchTool {
    fetcher: Arc<dyn PageFetcher>,
    chunker: TextChunker,
    default_max_tokens: usize,
}

impl ChunkedFetchTool {
    pub fn new(fetcher: Arc<dyn PageFetcher>, chunker: TextChunker, default_max_tokens: usize) -> Self {
        Self {
            fetcher,
            chunker,
            default_max_tokens,
        }
    }
}

#[async_trait]
impl Tool for ChunkedFetchTool {
    fn name(&self) -> &str {
        "chunked_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a web page and split it into chunks of at most max_tokens tokens, \
         both by paragraph and by sentence, with chunk size statistics."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                },
                "max_tokens": {
                    "type": "integer",
                    "description": "Token budget per chunk",
                    "default": self.default_max_tokens
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let url = required_str(self.name(), &args, "url")?;
        let max_tokens = optional_usize(&args, "max_tokens").unwrap_or(self.default_max_tokens);

        let chunked = fetch_and_chunk(self.fetcher.as_ref(), &self.chunker, url, max_tokens)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: self.name().to_string(),
                message: e.to_string(),
            })?;

        Ok(ToolOutput::Chunks {
            url: chunked.page.url,
            title: chunked.page.title,
            max_tokens,
            paragraph_chunks: chunked.paragraph_chunks,
            content_chunks: chunked.content_chunks,
            analysis: chunked.analysis,
        })
    }
}

// ---------------------------------------------------------------------------
// ResearchTool
// ---------------------------------------------------------------------------

/// Research one question and store the findings in the session dump.
pub struct ResearchTool {
    orchestrator: Arc<ResearchOrchestrator>,
    session: Arc<ResearchSession>,
}

impl ResearchTool {
    pub fn new(orchestrator: Arc<ResearchOrchestrator>, session: Arc<ResearchSession>) -> Self {
        Self {
            orchestrator,
            session,
        }
    }
}

#[async_trait]
impl Tool for ResearchTool {
    fn name(&self) -> &str {
        "research"
    }

    fn description(&self) -> &str {
        "Research a question on the web: generate search queries, fetch the top sources, \
         and store a question-focused summary of each source in the research dump."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The research question"
                }
            },
            "required": ["question"]
        })
    }

    fn timeout(&self) -> Duration {
        // the orchestrator enforces its own run timeout first
        Duration::from_secs(self.orchestrator.config().run_timeout_secs + 5)
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let raw = args.get("question").and_then(|v| v.as_str()).unwrap_or("");
        let question = ResearchQuestion::new(raw).map_err(|e| ToolError::InvalidArguments {
            name: self.name().to_string(),
            reason: e.to_string(),
        })?;

        let outcome = self
            .orchestrator
            .research(self.session.dump(), &question)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: self.name().to_string(),
                message: e.to_string(),
            })?;

        Ok(ToolOutput::Research {
            question: question.to_string(),
            success: outcome.succeeded(),
            queries: outcome.queries.iter().map(|q| q.to_string()).collect(),
            entries_added: outcome.entries_added,
            skipped_sources: outcome.skipped.len(),
        })
    }
}
