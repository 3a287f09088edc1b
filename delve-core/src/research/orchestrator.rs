//! Research orchestration: expand, search, fetch, summarize, append.
//!
//! One run handles one question. Queries are searched concurrently, per-URL
//! fetch and summarize pairs run on a bounded pool, and the collected entries
//! land in the dump with a single append at the end.

use super::dump::ResearchDump;
use super::expander::QueryExpander;
use super::retrieval::{PageFetcher, SourceFinder};
use super::session::{ResearchSession, SessionFlag};
use super::summarizer::{ContextualSummarizer, SummaryKind};
use super::types::{ResearchDumpEntry, ResearchQuestion, SearchQuery};
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A candidate URL that produced no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSource {
    pub url: String,
    pub reason: String,
}

/// What one research run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchOutcome {
    pub question: ResearchQuestion,
    pub queries: Vec<SearchQuery>,
    /// Candidate URLs after deduplication.
    pub candidates: Vec<String>,
    pub entries_added: usize,
    pub skipped: Vec<SkippedSource>,
    /// Entries whose summary came from a fallback path.
    pub degraded: usize,
    pub elapsed_ms: u64,
}

impl ResearchOutcome {
    /// True iff at least one entry reached the dump.
    pub fn succeeded(&self) -> bool {
        self.entries_added > 0
    }
}

/// Drives the research pipeline for individual questions.
pub struct ResearchOrchestrator {
    expander: QueryExpander,
    finder: SourceFinder,
    fetcher: Arc<dyn PageFetcher>,
    summarizer: ContextualSummarizer,
    config: ResearchConfig,
}

impl ResearchOrchestrator {
    pub fn new(
        expander: QueryExpander,
        finder: SourceFinder,
        fetcher: Arc<dyn PageFetcher>,
        summarizer: ContextualSummarizer,
        config: ResearchConfig,
    ) -> Self {
        Self {
            expander,
            finder,
            fetcher,
            summarizer,
            config,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Research one question and append its findings to `dump`.
    pub async fn research(
        &self,
        dump: &ResearchDump,
        question: &ResearchQuestion,
    ) -> Result<ResearchOutcome, ResearchError> {
        self.research_with_cancel(dump, question, &CancellationToken::new())
            .await
    }

    /// Like [`research`](Self::research), stopping early on `cancel` or when the
    /// run timeout elapses. A stopped run writes nothing.
    pub async fn research_with_cancel(
        &self,
        dump: &ResearchDump,
        question: &ResearchQuestion,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome, ResearchError> {
        let run_timeout = Duration::from_secs(self.config.run_timeout_secs);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(question = %question, "Research run cancelled");
                Err(ResearchError::Cancelled)
            }
            result = tokio::time::timeout(run_timeout, self.run(dump, question)) => {
                result.unwrap_or_else(|_| {
                    warn!(question = %question, timeout_secs = run_timeout.as_secs(), "Research run timed out");
                    Err(ResearchError::TimedOut {
                        timeout_secs: run_timeout.as_secs(),
                    })
                })
            }
        }
    }

    /// Research several questions concurrently against the same dump.
    ///
    /// Results are returned in input order.
    pub async fn research_all(
        &self,
        dump: &ResearchDump,
        questions: &[ResearchQuestion],
        cancel: &CancellationToken,
    ) -> Vec<Result<ResearchOutcome, ResearchError>> {
        join_all(
            questions
                .iter()
                .map(|question| self.research_with_cancel(dump, question, cancel)),
        )
        .await
    }

    /// Research a batch of questions into the session's dump, then mark the
    /// session's research as finished. A cancelled batch leaves the flag clear.
    pub async fn run_session(
        &self,
        session: &ResearchSession,
        questions: &[ResearchQuestion],
        cancel: &CancellationToken,
    ) -> Vec<Result<ResearchOutcome, ResearchError>> {
        let results = self.research_all(session.dump(), questions, cancel).await;
        if !cancel.is_cancelled() {
            session.set(SessionFlag::ResearchFinished);
        }
        let succeeded = results
            .iter()
            .filter(|r| matches!(r, Ok(outcome) if outcome.succeeded()))
            .count();
        info!(
            session = %session.id(),
            questions = questions.len(),
            succeeded,
            "Research batch finished"
        );
        results
    }

    async fn run(
        &self,
        dump: &ResearchDump,
        question: &ResearchQuestion,
    ) -> Result<ResearchOutcome, ResearchError> {
        let started = Instant::now();
        let queries = self.expander.expand(question).await?;

        let hits_per_query = join_all(queries.iter().map(|q| self.finder.find_hits(q))).await;
        let candidates = self.collect_candidates(hits_per_query.into_iter().flatten().map(|h| h.url));
        debug!(question = %question, candidates = candidates.len(), "Collected candidate URLs");

        let results: Vec<SourceResult> = stream::iter(candidates.iter().cloned())
            .map(|url| self.process_source(question, url))
            .buffer_unordered(self.config.max_concurrent_sources.max(1))
            .collect()
            .await;

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        let mut degraded = 0;
        for result in results {
            match result {
                SourceResult::Entry { entry, kind } => {
                    if kind != SummaryKind::Generated {
                        degraded += 1;
                    }
                    entries.push(entry);
                }
                SourceResult::Skipped(source) => skipped.push(source),
            }
        }

        let entries_added = entries.len();
        if entries_added > 0 {
            dump.append(question, entries).await;
        }

        let outcome = ResearchOutcome {
            question: question.clone(),
            queries,
            candidates,
            entries_added,
            skipped,
            degraded,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        if outcome.succeeded() {
            info!(
                question = %question,
                entries = outcome.entries_added,
                skipped = outcome.skipped.len(),
                degraded = outcome.degraded,
                elapsed_ms = outcome.elapsed_ms,
                "Research complete"
            );
        } else {
            warn!(
                question = %question,
                candidates = outcome.candidates.len(),
                skipped = outcome.skipped.len(),
                "Research produced no findings"
            );
        }
        Ok(outcome)
    }

    fn collect_candidates(&self, urls: impl Iterator<Item = String>) -> Vec<String> {
        if !self.config.dedupe_urls {
            return urls.collect();
        }
        let mut seen = HashSet::new();
        urls.filter(|url| seen.insert(url.clone())).collect()
    }

    async fn process_source(&self, question: &ResearchQuestion, url: String) -> SourceResult {
        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, error = %e, "Skipping source");
                return SourceResult::Skipped(SkippedSource {
                    url,
                    reason: e.to_string(),
                });
            }
        };

        let outcome = self.summarizer.summarize(question, &page.content).await;
        SourceResult::Entry {
            entry: ResearchDumpEntry {
                source: page.source_ref(),
                summary: outcome.summary,
            },
            kind: outcome.kind,
        }
    }
}

enum SourceResult {
    Entry {
        entry: ResearchDumpEntry,
        kind: SummaryKind,
    },
    Skipped(SkippedSource),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{LlmProvider, MockLlmProvider};
    use crate::config::{RetryConfig, SummarizerConfig};
    use crate::error::{FetchError, SearchError};
    use crate::research::retrieval::SearchProvider;
    use crate::research::types::{FetchedPage, SearchHit};
    use crate::types::CompletionRequest;
    use async_trait::async_trait;

    struct FixedSearch(Vec<&'static str>);

    #[async_trait]
    impl SearchProvider for FixedSearch {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
            Ok(self.0.iter().map(|u| SearchHit::new(*u)).collect())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct StubFetcher {
        delay: Duration,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            tokio::time::sleep(self.delay).await;
            if url.contains("missing") {
                return Err(FetchError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(FetchedPage {
                url: url.to_string(),
                title: format!("Page {url}"),
                content: "Plenty of text about the topic.".to_string(),
                paragraphs: vec![],
            })
        }
    }

    fn provider() -> Arc<MockLlmProvider> {
        Arc::new(MockLlmProvider::from_fn(|req: &CompletionRequest| {
            let system = &req.messages[0].content;
            let reply = if system.contains("search term generator") {
                r#"{"queries": ["q1", "q2"]}"#
            } else {
                "A short summary."
            };
            Ok(MockLlmProvider::text_response(reply))
        }))
    }

    fn orchestrator(
        urls: Vec<&'static str>,
        delay: Duration,
        config: ResearchConfig,
    ) -> ResearchOrchestrator {
        let provider: Arc<dyn LlmProvider> = provider();
        let retry = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        ResearchOrchestrator::new(
            QueryExpander::new(provider.clone(), 3).with_retry(retry.clone()),
            SourceFinder::new(Arc::new(FixedSearch(urls)), 5).with_retry(retry.clone()),
            Arc::new(StubFetcher { delay }),
            ContextualSummarizer::new(provider, SummarizerConfig::default()).with_retry(retry),
            config,
        )
    }

    #[tokio::test]
    async fn test_dedupes_candidates_across_queries() {
        let orch = orchestrator(
            vec!["https://a.example", "https://b.example"],
            Duration::ZERO,
            ResearchConfig::default(),
        );
        let dump = ResearchDump::new();
        let q = ResearchQuestion::new("Q").unwrap();

        let outcome = orch.research(&dump, &q).await.unwrap();
        // two queries return the same two URLs
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.entries_added, 2);
        assert_eq!(dump.entries_for(&q).await.len(), 2);
    }

    #[tokio::test]
    async fn test_without_dedupe_keeps_repeats() {
        let orch = orchestrator(
            vec!["https://a.example"],
            Duration::ZERO,
            ResearchConfig {
                dedupe_urls: false,
                ..ResearchConfig::default()
            },
        );
        let dump = ResearchDump::new();
        let q = ResearchQuestion::new("Q").unwrap();
        let outcome = orch.research(&dump, &q).await.unwrap();
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.entries_added, 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped() {
        let orch = orchestrator(
            vec!["https://a.example", "https://missing.example"],
            Duration::ZERO,
            ResearchConfig::default(),
        );
        let dump = ResearchDump::new();
        let q = ResearchQuestion::new("Q").unwrap();

        let outcome = orch.research(&dump, &q).await.unwrap();
        assert!(outcome.succeeded());
        assert_eq!(outcome.entries_added, 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].url, "https://missing.example");
        assert!(outcome.skipped[0].reason.contains("404"));
        let entries = dump.entries_for(&q).await;
        assert_eq!(entries[0].source.url, "https://a.example");
    }

    #[tokio::test]
    async fn test_cancel_writes_nothing() {
        let orch = orchestrator(
            vec!["https://a.example"],
            Duration::from_secs(30),
            ResearchConfig::default(),
        );
        let dump = ResearchDump::new();
        let q = ResearchQuestion::new("Q").unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = orch.research_with_cancel(&dump, &q, &cancel).await.unwrap_err();
        assert!(matches!(err, ResearchError::Cancelled));
        assert!(!dump.contains(&q).await);
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let orch = orchestrator(
            vec!["https://a.example"],
            Duration::from_secs(30),
            ResearchConfig {
                run_timeout_secs: 0,
                ..ResearchConfig::default()
            },
        );
        let dump = ResearchDump::new();
        let q = ResearchQuestion::new("Q").unwrap();
        let err = orch.research(&dump, &q).await.unwrap_err();
        assert!(matches!(err, ResearchError::TimedOut { timeout_secs: 0 }));
        assert!(dump.is_empty().await);
    }

    #[tokio::test]
    async fn test_run_session_sets_finished_flag() {
        let orch = orchestrator(
            vec!["https://a.example"],
            Duration::ZERO,
            ResearchConfig::default(),
        );
        let session = ResearchSession::new();
        let questions = vec![
            ResearchQuestion::new("Q1").unwrap(),
            ResearchQuestion::new("Q2").unwrap(),
        ];

        let results = orch
            .run_session(&session, &questions, &CancellationToken::new())
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.as_ref().is_ok_and(|o| o.succeeded())));
        assert!(session.is_set(SessionFlag::ResearchFinished));
        assert_eq!(session.dump().len().await, 2);
    }
}
