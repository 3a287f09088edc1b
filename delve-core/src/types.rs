//! Core type definitions for Delve.
//!
//! Defines the LLM message and completion structures, and the discriminated
//! output type returned by every tool.

use crate::chunker::ChunkAnalysis;
use crate::research::{FetchedPage, SearchHit};
use serde::{Deserialize, Serialize};

/// Represents a participant role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a completion request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Character length of the message content.
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }
}

/// Token usage statistics from an LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }

    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Requested shape of the model's reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    /// Free text.
    Text,
    /// A JSON document matching `schema`.
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// A request to the LLM for completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub stop_sequences: Vec<String>,
    pub model: Option<String>,
    pub response_format: ResponseFormat,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            temperature: 0.7,
            max_tokens: None,
            stop_sequences: Vec::new(),
            model: None,
            response_format: ResponseFormat::Text,
        }
    }
}

/// A response from the LLM.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: Message,
    pub usage: TokenUsage,
    pub model: String,
    pub finish_reason: Option<String>,
}

impl CompletionResponse {
    /// The reply text.
    pub fn text(&self) -> &str {
        &self.message.content
    }
}

/// A definition describing a tool to a caller (CLI listing, LLM tool schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Output produced by a tool execution.
///
/// Each tool produces exactly one variant; consumers match on it instead of
/// inspecting the shape of the payload. Serialized with a `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutput {
    /// Candidate sources for a search query.
    SearchResults { query: String, hits: Vec<SearchHit> },
    /// A fetched and extracted page.
    Page { page: FetchedPage },
    /// A fetched page split into token-budgeted chunks.
    Chunks {
        url: String,
        title: String,
        max_tokens: usize,
        paragraph_chunks: Vec<String>,
        content_chunks: Vec<String>,
        analysis: ChunkAnalysis,
    },
    /// Result of one research run for a question.
    Research {
        question: String,
        success: bool,
        queries: Vec<String>,
        entries_added: usize,
        skipped_sources: usize,
    },
}

impl ToolOutput {
    /// The discriminant name, identical to the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolOutput::SearchResults { .. } => "search_results",
            ToolOutput::Page { .. } => "page",
            ToolOutput::Chunks { .. } => "chunks",
            ToolOutput::Research { .. } => "research",
        }
    }
}
