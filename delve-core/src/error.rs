//! Error types for the Delve research core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering LLM, search, fetch, research orchestration, tool and configuration
//! domains.

use std::path::PathBuf;

/// Top-level error type for the Delve core library.
#[derive(Debug, thiserror::Error)]
pub enum DelveError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Streaming error: {message}")]
    Streaming { message: String },

    #[error("Context window exceeded: used {used} of {limit} tokens")]
    ContextOverflow { used: usize, limit: usize },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl LlmError {
    /// Whether the provider rejected the request because the prompt was too long.
    pub fn is_context_overflow(&self) -> bool {
        matches!(self, LlmError::ContextOverflow { .. })
    }
}

/// Errors from a search provider. Never fatal to a research run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {message}")]
    Transport { message: String },

    #[error("Search provider returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("Search timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Failed to parse search results: {message}")]
    Parse { message: String },
}

/// Errors from fetching and extracting a single page. Never fatal to a research run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported document type for '{url}'")]
    UnsupportedDocument { url: String },

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Fetch of '{url}' timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Fetch of '{url}' failed: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to read body of '{url}': {message}")]
    Body { url: String, message: String },

    #[error("No extractable text at '{url}'")]
    EmptyContent { url: String },
}

/// Errors surfaced by the research orchestrator.
///
/// Only input validation, query expansion, and caller-initiated cancellation
/// reach the caller; retrieval, fetch, and summarization failures are absorbed.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Research question must not be empty")]
    EmptyQuestion,

    #[error("Query expansion failed: {0}")]
    Expansion(#[from] LlmError),

    #[error("Query expansion returned an unusable query list: {reason}")]
    MalformedQueries { reason: String },

    #[error("Research run was cancelled")]
    Cancelled,

    #[error("Research run timed out after {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },
}

/// Errors from tool registration and execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Tool '{name}' execution failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Tool '{name}' timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `DelveError`.
pub type Result<T> = std::result::Result<T, DelveError>;
