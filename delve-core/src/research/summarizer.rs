//! Question-anchored summarization of fetched source text.
//!
//! Input is cut to a character ceiling before the call, the reply is clamped
//! to a word ceiling, and every failure degrades to a fallback text, so a
//! summary is always produced.

use super::types::{ResearchQuestion, Summary};
use crate::brain::{LlmProvider, complete_with_retry};
use crate::config::{RetryConfig, SummarizerConfig};
use crate::error::LlmError;
use crate::types::{CompletionRequest, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Appended to input that was cut to fit the ceiling.
pub const TRUNCATION_MARKER: &str = "[Content truncated to fit the context window]";

/// Fraction of the ceiling after which a sentence boundary is preferred as cut point.
const SENTENCE_CUT_FLOOR: f64 = 0.8;

/// Which path produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    /// The model's reply.
    Generated,
    /// The model rejected the input as too long; an excerpt was used instead.
    ContextFallback,
    /// The call failed or returned nothing; an explanatory note was used.
    ErrorFallback,
}

/// Result of one summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub summary: Summary,
    pub kind: SummaryKind,
    /// Whether the input was cut before the call.
    pub truncated_input: bool,
}

impl SummaryOutcome {
    pub fn is_degraded(&self) -> bool {
        self.kind != SummaryKind::Generated
    }
}

/// Text ready to send to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInput {
    pub text: String,
    pub truncated: bool,
}

/// Cut `raw` to at most `max_chars` characters plus the truncation marker.
///
/// Prefers to end just after the last `.`, `!` or `?` found in the final 20%
/// of the allowed span; otherwise cuts hard at the ceiling.
pub fn prepare_input(raw: &str, max_chars: usize) -> PreparedInput {
    let Some((ceiling_byte, _)) = raw.char_indices().nth(max_chars) else {
        return PreparedInput {
            text: raw.to_string(),
            truncated: false,
        };
    };

    let floor_chars = (max_chars as f64 * SENTENCE_CUT_FLOOR) as usize;
    let floor_byte = raw
        .char_indices()
        .nth(floor_chars)
        .map_or(ceiling_byte, |(i, _)| i);

    let head = &raw[..ceiling_byte];
    let cut = head[floor_byte..]
        .rfind(['.', '!', '?'])
        .map_or(ceiling_byte, |pos| floor_byte + pos + 1);

    PreparedInput {
        text: format!("{}\n\n{}", raw[..cut].trim_end(), TRUNCATION_MARKER),
        truncated: true,
    }
}

/// Keep at most `max_words` whitespace-separated words, appending `...` when cut.
pub fn clamp_words(text: &str, max_words: usize) -> String {
    let trimmed = text.trim();
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() <= max_words {
        return trimmed.to_string();
    }
    let mut clamped = words[..max_words].join(" ");
    clamped.push_str("...");
    clamped
}

/// Produces bounded, question-anchored summaries. Never fails.
pub struct ContextualSummarizer {
    provider: Arc<dyn LlmProvider>,
    config: SummarizerConfig,
    retry: RetryConfig,
}

impl ContextualSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: SummarizerConfig) -> Self {
        Self {
            provider,
            config,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize `raw_text` with respect to `question`.
    pub async fn summarize(&self, question: &ResearchQuestion, raw_text: &str) -> SummaryOutcome {
        let prepared = prepare_input(raw_text, self.config.max_input_chars);
        if prepared.truncated {
            debug!(
                original_chars = raw_text.chars().count(),
                ceiling = self.config.max_input_chars,
                "Truncated summarizer input"
            );
        }

        let request = self.build_request(question, &prepared.text);
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let result =
            complete_with_retry(self.provider.as_ref(), &request, timeout, &self.retry).await;

        let (text, kind) = match result {
            Ok(response) if !response.text().trim().is_empty() => {
                (response.text().to_string(), SummaryKind::Generated)
            }
            Ok(_) => {
                warn!(question = %question, "Summarizer returned an empty reply");
                (
                    "[Summary unavailable: the model returned an empty reply.]".to_string(),
                    SummaryKind::ErrorFallback,
                )
            }
            Err(e @ LlmError::ContextOverflow { .. }) => {
                warn!(question = %question, error = %e, "Source too long for summarizer, using excerpt");
                (self.excerpt_fallback(raw_text), SummaryKind::ContextFallback)
            }
            Err(e) => {
                warn!(question = %question, error = %e, "Summarization failed");
                (
                    format!("[Summary unavailable: {e}]"),
                    SummaryKind::ErrorFallback,
                )
            }
        };

        let clamped = clamp_words(&text, self.config.max_words.max(1));
        let summary = match Summary::new(clamped) {
            Some(summary) => summary,
            None => fallback_summary(),
        };
        SummaryOutcome {
            summary,
            kind,
            truncated_input: prepared.truncated,
        }
    }

    fn excerpt_fallback(&self, raw_text: &str) -> String {
        let excerpt: String = raw_text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(self.config.fallback_chars)
            .collect();
        format!(
            "[Summary unavailable: the source exceeded the model's context window. \
             Opening excerpt follows.] {excerpt}"
        )
    }

    fn build_request(&self, question: &ResearchQuestion, text: &str) -> CompletionRequest {
        let system = format!(
            "You are a contextual summarizer, summarizing information from research sources.\n\
             Summarize the text provided by the user with respect to the research question below.\n\
             Include relevant statistics, data, and other facts that bear on the question.\n\
             If a statistic is attributed to another source, cite the URL or source name at the end of the sentence.\n\
             Use no more than {} words.\n\
             Research question: {}",
            self.config.max_words, question
        );
        CompletionRequest {
            messages: vec![Message::system(system), Message::user(text)],
            temperature: 0.3,
            max_tokens: Some(self.config.max_words * 2),
            ..Default::default()
        }
    }
}

fn fallback_summary() -> Summary {
    Summary::new("[Summary unavailable.]").unwrap_or_else(|| unreachable!("literal is non-blank"))
}
