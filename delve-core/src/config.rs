//! Configuration system for Delve.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from the user config dir (`~/.config/delve/config.toml` on Linux)
//! and/or `.delve/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for Delve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DelveConfig {
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub research: ResearchConfig,
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    pub summarizer: SummarizerConfig,
    pub chunking: ChunkingConfig,
}

impl DelveConfig {
    /// Validate every section and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.llm.validate();
        if self.research.queries_per_question == 0 {
            warnings.push("research.queries_per_question is 0; no searches will run".into());
        }
        if self.research.max_concurrent_sources == 0 {
            warnings.push(
                "research.max_concurrent_sources is 0; one source at a time will be used".into(),
            );
        }
        if self.search.max_results == 0 {
            warnings.push("search.max_results is 0; no sources will be found".into());
        }
        if self.fetch.max_content_chars < 100 {
            warnings.push(format!(
                "fetch.max_content_chars ({}) is very small; summaries will lack context",
                self.fetch.max_content_chars
            ));
        }
        if self.summarizer.max_words == 0 {
            warnings.push("summarizer.max_words is 0; summaries will be empty".into());
        }
        if self.summarizer.max_input_chars < self.summarizer.fallback_chars {
            warnings.push(format!(
                "summarizer.max_input_chars ({}) < summarizer.fallback_chars ({})",
                self.summarizer.max_input_chars, self.summarizer.fallback_chars
            ));
        }
        if self.chunking.max_tokens == 0 {
            warnings.push("chunking.max_tokens is 0; every unit becomes its own chunk".into());
        }
        if self.retry.backoff_multiplier < 1.0 {
            warnings.push(format!(
                "retry.backoff_multiplier ({}) < 1.0; backoff will shrink between attempts",
                self.retry.backoff_multiplier
            ));
        }
        warnings
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai", "ollama", "local", ...
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key. Takes precedence over `api_key_env`; never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Context window size for models without built-in metadata.
    pub context_window: usize,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 1024,
            temperature: 0.3,
            context_window: 128_000,
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_tokens >= self.context_window {
            warnings.push(format!(
                "max_tokens ({}) >= context_window ({}); responses may be truncated or fail",
                self.max_tokens, self.context_window
            ));
        }
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.temperature
            ));
        }
        if self.request_timeout_secs == 0 {
            warnings.push("request_timeout_secs is 0; every request will time out".into());
        }
        warnings
    }
}

/// Retry policy for transient LLM and search failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Orchestration limits for one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Search queries generated per question.
    pub queries_per_question: usize,
    /// Sources fetched and summarized at the same time within one run.
    pub max_concurrent_sources: usize,
    /// Drop repeated URLs across the queries of one question.
    pub dedupe_urls: bool,
    /// Upper bound on a whole research run.
    pub run_timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            queries_per_question: 3,
            max_concurrent_sources: 4,
            dedupe_urls: true,
            run_timeout_secs: 300,
        }
    }
}

/// Search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Provider name. Only "duckduckgo" is built in.
    pub provider: String,
    pub base_url: String,
    /// Candidate URLs kept per query.
    pub max_results: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "duckduckgo".to_string(),
            base_url: "https://html.duckduckgo.com".to_string(),
            max_results: 5,
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// User agent sent with search and page requests.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; DelveResearchBot/1.0)";

/// Page fetch and extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Extracted content is capped at this many characters.
    pub max_content_chars: usize,
    /// Blocks must be longer than this to count as content.
    pub min_block_chars: usize,
    /// Fallback lines must be longer than this to be kept.
    pub min_line_chars: usize,
    pub max_redirects: usize,
    /// Response bodies are read up to this many bytes; the rest is discarded.
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_content_chars: 10_000,
            min_block_chars: 20,
            min_line_chars: 10,
            max_redirects: 5,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Contextual summarizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Input character ceiling before truncation.
    pub max_input_chars: usize,
    /// Word ceiling applied to every summary.
    pub max_words: usize,
    /// Characters of raw text used for the context-overflow fallback.
    pub fallback_chars: usize,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 24_000,
            max_words: 200,
            fallback_chars: 500,
            timeout_secs: 60,
        }
    }
}

/// Token-budgeted chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    /// Model whose tokenizer is used for counting.
    pub model: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            model: "text-embedding-3-small".to_string(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "delve", "delve")
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Directory for logs and saved sessions, if a home directory is known.
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Load configuration by merging layers.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DELVE_`)
/// 3. Workspace-local config (`.delve/config.toml`)
/// 4. User config
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&DelveConfig>,
) -> Result<DelveConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DelveConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".delve").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // DELVE_LLM__MODEL, DELVE_RESEARCH__MAX_CONCURRENT_SOURCES, ...
    figment = figment.merge(Env::prefixed("DELVE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DelveConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.research.queries_per_question, 3);
        assert_eq!(config.research.max_concurrent_sources, 4);
        assert!(config.research.dedupe_urls);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.max_content_chars, 10_000);
        assert_eq!(config.summarizer.max_input_chars, 24_000);
        assert_eq!(config.summarizer.max_words, 200);
        assert_eq!(config.chunking.model, "text-embedding-3-small");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = DelveConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: DelveConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.llm.model, config.llm.model);
        assert_eq!(deserialized.fetch.user_agent, config.fetch.user_agent);
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = DelveConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let toml_str = toml::to_string(&config).unwrap();
        assert!(!toml_str.contains("sk-secret"));
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.search.provider, "duckduckgo");
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = DelveConfig::default();
        overrides.llm.model = "gpt-4o".to_string();
        overrides.research.max_concurrent_sources = 8;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.research.max_concurrent_sources, 8);
    }

    #[test]
    fn test_load_config_from_workspace_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let delve_dir = dir.path().join(".delve");
        std::fs::create_dir_all(&delve_dir).unwrap();
        std::fs::write(
            delve_dir.join("config.toml"),
            r#"
[llm]
model = "llama3.1:8b"
base_url = "http://localhost:11434/v1"

[research]
dedupe_urls = false
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.llm.model, "llama3.1:8b");
        assert_eq!(config.llm.provider, "openai");
        assert!(!config.research.dedupe_urls);
        assert_eq!(config.research.queries_per_question, 3);
    }

    #[test]
    fn test_validate_defaults_clean() {
        assert!(DelveConfig::default().validate().is_empty());
    }

    #[test]
    fn test_llm_config_validate_max_tokens_exceeds_context() {
        let config = LlmConfig {
            max_tokens: 200_000,
            ..LlmConfig::default()
        };
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("max_tokens"));
    }

    #[test]
    fn test_llm_config_validate_bad_temperature() {
        let config = LlmConfig {
            temperature: 3.5,
            ..LlmConfig::default()
        };
        assert!(config.validate()[0].contains("temperature"));
    }

    #[test]
    fn test_validate_reports_zero_limits() {
        let mut config = DelveConfig::default();
        config.research.queries_per_question = 0;
        config.search.max_results = 0;
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("queries_per_question")));
        assert!(warnings.iter().any(|w| w.contains("max_results")));
    }
}
