//! End-to-end tests for the research pipeline with scripted collaborators.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use delve_core::config::{ResearchConfig, RetryConfig, SummarizerConfig};
use delve_core::research::{
    ContextualSummarizer, FetchedPage, PageFetcher, QueryExpander, ResearchDump,
    ResearchOrchestrator, ResearchQuestion, ResearchSession, SearchHit, SearchProvider,
    SessionFlag, SourceFinder,
};
use delve_core::{
    CompletionRequest, FetchError, LlmError, LlmProvider, MockLlmProvider, ResearchError,
    SearchError,
};

/// Search provider answering from a fixed query → URLs table.
struct TableSearch {
    table: HashMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl TableSearch {
    fn new(entries: Vec<(&str, Vec<&str>)>) -> Self {
        Self {
            table: entries
                .into_iter()
                .map(|(q, urls)| (q.to_string(), urls.into_iter().map(String::from).collect()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchProvider for TableSearch {
    async fn search(&self, query: &str, max: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .table
            .get(query)
            .into_iter()
            .flatten()
            .take(max)
            .map(SearchHit::new)
            .collect())
    }

    fn name(&self) -> &str {
        "table"
    }
}

/// Fetcher serving canned pages; URLs containing "404" fail.
struct CannedFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("404") {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(FetchedPage {
            url: url.to_string(),
            title: format!("Report at {url}"),
            content: "Electric vehicle sales grew 35% year over year in 2023.".to_string(),
            paragraphs: vec![],
        })
    }
}

fn llm(queries: &'static str) -> Arc<MockLlmProvider> {
    Arc::new(MockLlmProvider::from_fn(move |req: &CompletionRequest| {
        if req.messages[0].content.contains("search term generator") {
            Ok(MockLlmProvider::text_response(queries))
        } else {
            // well past the word ceiling
            Ok(MockLlmProvider::text_response(&"growth ".repeat(300)))
        }
    }))
}

fn no_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    }
}

fn build(
    provider: Arc<dyn LlmProvider>,
    search: Arc<TableSearch>,
    fetcher: Arc<CannedFetcher>,
) -> ResearchOrchestrator {
    ResearchOrchestrator::new(
        QueryExpander::new(provider.clone(), 3).with_retry(no_retry()),
        SourceFinder::new(search, 5).with_retry(no_retry()),
        fetcher,
        ContextualSummarizer::new(provider, SummarizerConfig::default()).with_retry(no_retry()),
        ResearchConfig::default(),
    )
}

fn fetcher() -> Arc<CannedFetcher> {
    Arc::new(CannedFetcher {
        calls: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn test_three_queries_two_urls_each_yield_six_entries() {
    let search = Arc::new(TableSearch::new(vec![
        ("q1", vec!["https://a.example/1", "https://a.example/2"]),
        ("q2", vec!["https://b.example/1", "https://b.example/2"]),
        ("q3", vec!["https://c.example/1", "https://c.example/2"]),
    ]));
    let orch = build(llm(r#"{"queries": ["q1", "q2", "q3"]}"#), search, fetcher());
    let dump = ResearchDump::new();
    let question = ResearchQuestion::new("How fast are EV sales growing?").unwrap();

    let outcome = orch.research(&dump, &question).await.unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.entries_added, 6);
    assert_eq!(outcome.degraded, 0);

    let entries = dump.entries_for(&question).await;
    assert_eq!(entries.len(), 6);
    for entry in &entries {
        assert!(!entry.source.title.is_empty());
        assert!(entry.source.title.ends_with(&entry.source.url));
        assert!(entry.summary.word_count() <= 200);
    }
    let mut urls: Vec<&str> = entries.iter().map(|e| e.source.url.as_str()).collect();
    urls.sort_unstable();
    assert_eq!(
        urls,
        vec![
            "https://a.example/1",
            "https://a.example/2",
            "https://b.example/1",
            "https://b.example/2",
            "https://c.example/1",
            "https://c.example/2",
        ]
    );
}

#[tokio::test]
async fn test_no_search_results_means_no_findings_and_no_key() {
    let search = Arc::new(TableSearch::new(vec![]));
    let fetcher = fetcher();
    let orch = build(
        llm(r#"{"queries": ["q1", "q2", "q3"]}"#),
        search.clone(),
        fetcher.clone(),
    );
    let dump = ResearchDump::new();
    let question = ResearchQuestion::new("Obscure topic").unwrap();

    let outcome = orch.research(&dump, &question).await.unwrap();
    assert!(!outcome.succeeded());
    assert_eq!(search.calls.load(Ordering::SeqCst), 3);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(!dump.contains(&question).await);
    assert!(dump.entries_for(&question).await.is_empty());
}

#[tokio::test]
async fn test_not_found_source_is_excluded_siblings_kept() {
    let search = Arc::new(TableSearch::new(vec![(
        "q1",
        vec![
            "https://ok.example/a",
            "https://gone.example/404",
            "https://ok.example/b",
        ],
    )]));
    let orch = build(llm(r#"["q1"]"#), search, fetcher());
    let dump = ResearchDump::new();
    let question = ResearchQuestion::new("Q").unwrap();

    let outcome = orch.research(&dump, &question).await.unwrap();
    assert_eq!(outcome.entries_added, 2);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].url, "https://gone.example/404");
    assert!(
        dump.entries_for(&question)
            .await
            .iter()
            .all(|e| !e.source.url.contains("404"))
    );
}

#[test]
fn test_blank_question_is_rejected() {
    assert!(matches!(
        ResearchQuestion::new("   \n"),
        Err(ResearchError::EmptyQuestion)
    ));
}

#[tokio::test]
async fn test_expansion_failure_surfaces_and_writes_nothing() {
    let provider = Arc::new(MockLlmProvider::new());
    provider.queue_error(LlmError::AuthFailed {
        provider: "openai".into(),
    });
    let search = Arc::new(TableSearch::new(vec![]));
    let orch = build(provider, search.clone(), fetcher());
    let dump = ResearchDump::new();
    let question = ResearchQuestion::new("Q").unwrap();

    let err = orch.research(&dump, &question).await.unwrap_err();
    assert!(matches!(err, ResearchError::Expansion(_)));
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    assert!(dump.is_empty().await);
}

#[tokio::test]
async fn test_malformed_query_list_surfaces() {
    let orch = build(
        llm("ev sales, battery costs"),
        Arc::new(TableSearch::new(vec![])),
        fetcher(),
    );
    let dump = ResearchDump::new();
    let err = orch
        .research(&dump, &ResearchQuestion::new("Q").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::MalformedQueries { .. }));
}

#[tokio::test]
async fn test_concurrent_questions_share_one_dump() {
    let search = Arc::new(TableSearch::new(vec![
        ("q1", vec!["https://a.example/1", "https://a.example/2"]),
        ("q2", vec!["https://b.example/1"]),
    ]));
    let orch = build(llm(r#"{"queries": ["q1", "q2"]}"#), search, fetcher());
    let session = ResearchSession::new();
    let questions: Vec<ResearchQuestion> = (0..8)
        .map(|i| ResearchQuestion::new(format!("Question {i}")).unwrap())
        .collect();

    let results = orch
        .run_session(&session, &questions, &CancellationToken::new())
        .await;

    let outcomes: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    assert!(outcomes.iter().all(|o| o.entries_added == 3));
    assert_eq!(session.dump().len().await, 8);
    assert_eq!(session.dump().total_entries().await, 24);
    assert!(session.is_set(SessionFlag::ResearchFinished));
}

#[tokio::test]
async fn test_cancelled_batch_leaves_session_unfinished() {
    let orch = build(
        llm(r#"["q1"]"#),
        Arc::new(TableSearch::new(vec![("q1", vec!["https://a.example/1"])])),
        fetcher(),
    );
    let session = ResearchSession::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = orch
        .run_session(&session, &[ResearchQuestion::new("Q").unwrap()], &cancel)
        .await;
    assert!(matches!(results[0], Err(ResearchError::Cancelled)));
    assert!(session.dump().is_empty().await);
    assert!(!session.is_set(SessionFlag::ResearchFinished));
}
