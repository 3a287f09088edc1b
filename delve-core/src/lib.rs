//! # Delve Core
//!
//! Core library for the Delve research pipeline.
//! Provides the LLM interface (brain), providers, retry policy, text chunking,
//! configuration, and the research domain: query expansion, source finding,
//! contextual summarization, orchestration, and the per-session research dump.

pub mod brain;
pub mod chunker;
pub mod config;
pub mod error;
pub mod persistence;
pub mod providers;
pub mod research;
pub mod retry;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider, TokenCounter, complete_with_retry};
pub use chunker::{ChunkAnalysis, TextChunker};
pub use config::{DelveConfig, load_config};
pub use error::{
    ConfigError, DelveError, FetchError, LlmError, ResearchError, Result, SearchError, ToolError,
};
pub use research::{
    ContextualSummarizer, FetchedPage, PageFetcher, QueryExpander, ResearchDump,
    ResearchDumpEntry, ResearchOrchestrator, ResearchOutcome, ResearchQuestion, ResearchSession,
    SearchHit, SearchProvider, SearchQuery, SessionFlag, SourceFinder, SourceRef, Summary,
};
pub use retry::{Transient, with_retry};
pub use types::{
    CompletionRequest, CompletionResponse, Message, ResponseFormat, Role, TokenUsage,
    ToolDefinition, ToolOutput,
};
