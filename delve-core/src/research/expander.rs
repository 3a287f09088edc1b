//! Query expansion: one research question into a few search queries.
//!
//! The model is asked for `{"queries": [...]}`. Providers that support it get
//! a JSON schema response format; others get the same contract in the prompt.

use super::types::{ResearchQuestion, SearchQuery};
use crate::brain::{LlmProvider, complete_with_retry};
use crate::config::RetryConfig;
use crate::error::ResearchError;
use crate::types::{CompletionRequest, Message, ResponseFormat};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Turns a research question into search queries with one LLM call.
pub struct QueryExpander {
    provider: Arc<dyn LlmProvider>,
    retry: RetryConfig,
    queries_per_question: usize,
    timeout: Duration,
}

impl QueryExpander {
    pub fn new(provider: Arc<dyn LlmProvider>, queries_per_question: usize) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            queries_per_question,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queries_per_question(&self) -> usize {
        self.queries_per_question
    }

    /// Generate at most `queries_per_question` distinct queries for `question`.
    pub async fn expand(
        &self,
        question: &ResearchQuestion,
    ) -> Result<Vec<SearchQuery>, ResearchError> {
        let request = self.build_request(question);
        let response =
            complete_with_retry(self.provider.as_ref(), &request, self.timeout, &self.retry)
                .await?;
        debug!(reply = %response.text(), "Query expansion reply");

        let queries = parse_queries(response.text(), self.queries_per_question)?;
        info!(
            question = %question,
            count = queries.len(),
            "Expanded question into search queries"
        );
        Ok(queries)
    }

    fn build_request(&self, question: &ResearchQuestion) -> CompletionRequest {
        let n = self.queries_per_question;
        let system = format!(
            "You are a search term generator.\n\
             Given a research question, generate {n} search queries to use for web search.\n\
             Each query should be a short phrase of important keywords that targets the question.\n\
             Respond with a JSON object of the form {{\"queries\": [\"...\", \"...\"]}} and nothing else."
        );
        let response_format = if self.provider.supports_structured_output() {
            ResponseFormat::JsonSchema {
                name: "search_queries".to_string(),
                schema: queries_schema(),
            }
        } else {
            ResponseFormat::Text
        };
        CompletionRequest {
            messages: vec![Message::system(system), Message::user(question.as_str())],
            temperature: 0.3,
            max_tokens: Some(256),
            response_format,
            ..Default::default()
        }
    }
}

fn queries_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "queries": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["queries"],
        "additionalProperties": false
    })
}

/// Parse a query list reply.
///
/// Accepts `{"queries": [...]}` or a bare array, optionally inside a Markdown
/// code fence. Blank and case-insensitively repeated entries are dropped and
/// the result is cut to `limit`.
pub fn parse_queries(reply: &str, limit: usize) -> Result<Vec<SearchQuery>, ResearchError> {
    let body = strip_code_fence(reply);
    let value: Value =
        serde_json::from_str(body).map_err(|e| ResearchError::MalformedQueries {
            reason: format!("reply is not JSON: {e}"),
        })?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("queries") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ResearchError::MalformedQueries {
                    reason: "missing \"queries\" array".to_string(),
                });
            }
        },
        _ => {
            return Err(ResearchError::MalformedQueries {
                reason: "expected an object or array".to_string(),
            });
        }
    };

    let mut seen = HashSet::new();
    let queries: Vec<SearchQuery> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(q.to_lowercase()))
        .map(SearchQuery::new)
        .collect();

    if queries.is_empty() {
        return Err(ResearchError::MalformedQueries {
            reason: "no usable queries".to_string(),
        });
    }
    Ok(queries.into_iter().take(limit).collect())
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
