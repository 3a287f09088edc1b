//! LLM provider implementations.
//!
//! Currently one wire format is spoken: the OpenAI chat completions API,
//! which also covers Azure OpenAI, Ollama, vLLM and LM Studio.
//!
//! Use `create_provider()` to instantiate the provider from config.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

pub use crate::retry::{Transient, with_retry};
pub use openai_compat::OpenAiCompatibleProvider;

/// Provider names understood by [`create_provider`].
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "azure", "ollama", "vllm", "lmstudio", "local"];

/// Create an LLM provider based on the configuration.
///
/// Returns an error if the provider is unknown or cannot be initialized
/// (for example, when the API key is missing).
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    if !SUPPORTED_PROVIDERS.contains(&config.provider.as_str()) {
        return Err(LlmError::ApiRequest {
            message: format!(
                "Unsupported provider '{}'; expected one of: {}",
                config.provider,
                SUPPORTED_PROVIDERS.join(", ")
            ),
        });
    }
    tracing::debug!(provider = %config.provider, model = %config.model, "Creating LLM provider");
    Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
}
