//! # Delve Tools
//!
//! Web-facing implementations for the Delve research pipeline: HTML
//! extraction, the HTTP page fetcher, the DuckDuckGo search provider,
//! chunked fetching, and the tool registry with its research tools.

pub mod chunked;
pub mod extract;
pub mod fetch;
pub mod registry;
pub mod search;
pub mod web;

use delve_core::brain::LlmProvider;
use delve_core::chunker::TextChunker;
use delve_core::config::DelveConfig;
use delve_core::research::{
    ContextualSummarizer, PageFetcher, QueryExpander, ResearchOrchestrator, ResearchSession,
    SearchProvider, SourceFinder,
};
use registry::{Tool, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;

pub use fetch::HttpPageFetcher;
pub use search::DuckDuckGoSearch;

/// The wired research pipeline and its HTTP collaborators.
pub struct ResearchComponents {
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub chunker: TextChunker,
    pub orchestrator: Arc<ResearchOrchestrator>,
    pub max_results: usize,
    pub chunk_tokens: usize,
}

impl ResearchComponents {
    /// Build the HTTP search provider and fetcher from `config` and wire the orchestrator.
    pub fn from_config(
        config: &DelveConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> reqwest::Result<Self> {
        let search: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoSearch::new(&config.search)?);
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(&config.fetch)?);
        Ok(Self::with_backends(config, provider, search, fetcher))
    }

    /// Wire the orchestrator around caller-supplied search and fetch backends.
    pub fn with_backends(
        config: &DelveConfig,
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let llm_timeout = Duration::from_secs(config.llm.request_timeout_secs);
        let expander = QueryExpander::new(provider.clone(), config.research.queries_per_question)
            .with_retry(config.retry.clone())
            .with_timeout(llm_timeout);
        let finder = SourceFinder::new(search.clone(), config.search.max_results)
            .with_retry(config.retry.clone())
            .with_timeout(Duration::from_secs(config.search.timeout_secs));
        let summarizer = ContextualSummarizer::new(provider, config.summarizer.clone())
            .with_retry(config.retry.clone());
        let orchestrator = Arc::new(ResearchOrchestrator::new(
            expander,
            finder,
            fetcher.clone(),
            summarizer,
            config.research.clone(),
        ));

        Self {
            search,
            fetcher,
            chunker: TextChunker::for_model(&config.chunking.model),
            orchestrator,
            max_results: config.search.max_results,
            chunk_tokens: config.chunking.max_tokens,
        }
    }
}

/// Register `web_search`, `web_fetch`, `chunked_fetch` and `research`.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    components: &ResearchComponents,
    session: Arc<ResearchSession>,
) {
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(web::WebSearchTool::new(
            components.search.clone(),
            components.max_results,
        )),
        Arc::new(web::WebFetchTool::new(components.fetcher.clone())),
        Arc::new(web::ChunkedFetchTool::new(
            components.fetcher.clone(),
            components.chunker.clone(),
            components.chunk_tokens,
        )),
        Arc::new(web::ResearchTool::new(
            components.orchestrator.clone(),
            session,
        )),
    ];

    for tool in tools {
        if let Err(e) = registry.register(tool) {
            tracing::warn!("Failed to register tool: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::brain::MockLlmProvider;

    fn components() -> ResearchComponents {
        ResearchComponents::from_config(
            &DelveConfig::default(),
            Arc::new(MockLlmProvider::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_register_all_builtin_tools() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, &components(), Arc::new(ResearchSession::new()));

        assert_eq!(
            registry.list_names(),
            vec!["chunked_fetch", "research", "web_fetch", "web_search"]
        );
    }

    #[test]
    fn test_tool_definitions_are_valid_json() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, &components(), Arc::new(ResearchSession::new()));

        for def in registry.list_definitions() {
            assert!(!def.description.is_empty(), "Tool description should not be empty");
            assert!(
                def.parameters.is_object(),
                "Parameters should be a JSON object for tool '{}'",
                def.name
            );
        }
    }

    #[test]
    fn test_components_follow_config() {
        let mut config = DelveConfig::default();
        config.search.max_results = 7;
        config.chunking.max_tokens = 128;
        let components = ResearchComponents::from_config(&config, Arc::new(MockLlmProvider::new()))
            .unwrap();
        assert_eq!(components.max_results, 7);
        assert_eq!(components.chunk_tokens, 128);
        assert_eq!(components.search.name(), "duckduckgo");
    }
}
