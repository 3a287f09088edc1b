//! Brain module: LLM provider abstraction and token counting.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions, the
//! `TokenCounter` used for budgeting, and a scriptable mock provider.

use crate::config::RetryConfig;
use crate::error::LlmError;
use crate::retry::with_retry;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Estimate the token count for a set of messages.
    fn estimate_tokens(&self, messages: &[Message]) -> usize;

    /// Return the context window size for this provider/model.
    fn context_window(&self) -> usize;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Whether this provider honors a JSON-schema response format.
    fn supports_structured_output(&self) -> bool {
        false
    }
}

/// Run one completion under a per-attempt timeout, retrying transient failures.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    request: &CompletionRequest,
    timeout: Duration,
    retry: &RetryConfig,
) -> Result<CompletionResponse, LlmError> {
    with_retry(retry, move || async move {
        match tokio::time::timeout(timeout, provider.complete(request.clone())).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    })
    .await
}

/// Token counting strategy.
///
/// Uses a BPE tokenizer when the model is known to `tiktoken-rs`, otherwise
/// the deterministic `chars / 4` approximation.
#[derive(Clone)]
pub enum TokenCounter {
    Bpe(Arc<tiktoken_rs::CoreBPE>),
    Approximate,
}

impl TokenCounter {
    /// Create a token counter for the given model.
    pub fn for_model(model: &str) -> Self {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Self::Bpe(Arc::new(bpe)),
            Err(e) => {
                tracing::debug!(model, error = %e, "No tokenizer for model, approximating");
                Self::Approximate
            }
        }
    }

    /// A counter that never loads a tokenizer.
    pub fn approximate() -> Self {
        Self::Approximate
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Bpe(_))
    }

    /// Count the number of tokens in a string.
    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Self::Approximate => text.chars().count() / 4,
        }
    }

    /// Estimate the token count for a set of messages.
    /// Adds overhead for message structure (role, separators).
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        let mut total = 0;
        for msg in messages {
            // role token + separators
            total += 4;
            total += self.count(&msg.content);
        }
        total + 3
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bpe(_) => f.write_str("TokenCounter::Bpe"),
            Self::Approximate => f.write_str("TokenCounter::Approximate"),
        }
    }
}

type MockHandler =
    Box<dyn Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync>;

/// A mock LLM provider for testing and development.
///
/// Replies come from, in order of precedence: the queued script, the
/// handler installed with [`MockLlmProvider::from_fn`], then a fixed
/// placeholder text. Every request is recorded.
pub struct MockLlmProvider {
    model: String,
    context_window: usize,
    structured_output: bool,
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    handler: Option<MockHandler>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            context_window: 128_000,
            structured_output: false,
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        let text = text.to_string();
        Self::from_fn(move |_| Ok(Self::text_response(&text)))
    }

    /// Create a MockLlmProvider that computes each reply from the request.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    /// Report structured-output support to callers.
    pub fn with_structured_output(mut self, enabled: bool) -> Self {
        self.structured_output = enabled;
        self
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.lock_responses().push_back(Ok(response));
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.lock_responses().push_back(Err(error));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<CompletionResponse, LlmError>>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if let Some(scripted) = self.lock_responses().pop_front() {
            return scripted;
        }
        match &self.handler {
            Some(handler) => handler(&request),
            None => Ok(Self::text_response(
                "I'm a mock LLM. No queued responses available.",
            )),
        }
    }

    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        // ~4 chars per token
        messages.iter().map(|m| m.content.len() / 4).sum()
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_structured_output(&self) -> bool {
        self.structured_output
    }
}
