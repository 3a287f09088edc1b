//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use anyhow::Context;
use delve_core::chunker::{ChunkAnalysis, TextChunker};
use delve_core::config::DelveConfig;
use delve_core::error::ResearchError;
use delve_core::providers::create_provider;
use delve_core::research::{
    PageFetcher, QuestionFindings, ResearchOutcome, ResearchQuestion, ResearchSession,
    SearchProvider,
};
use delve_tools::chunked::fetch_and_chunk;
use delve_tools::{DuckDuckGoSearch, HttpPageFetcher, ResearchComponents};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: DelveConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match command {
        Commands::Research {
            questions,
            json,
            out,
        } => handle_research(questions, json, out, &config).await,
        Commands::Search {
            query,
            max_results,
            json,
        } => handle_search(&query, max_results, json, &config).await,
        Commands::Fetch {
            url,
            chunk_tokens,
            json,
        } => handle_fetch(&url, chunk_tokens, json, &config).await,
        Commands::Chunk {
            file,
            max_tokens,
            sentences,
        } => handle_chunk(&file, max_tokens, sentences, &config).await,
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

#[derive(Serialize)]
struct ResearchReport {
    session: String,
    outcomes: Vec<QuestionReport>,
    findings: Vec<QuestionFindings>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum QuestionReport {
    Finished(ResearchOutcome),
    Failed { question: String, error: String },
}

async fn handle_research(
    raw_questions: Vec<String>,
    json: bool,
    out: Option<PathBuf>,
    config: &DelveConfig,
) -> anyhow::Result<()> {
    let questions = raw_questions
        .iter()
        .map(ResearchQuestion::new)
        .collect::<Result<Vec<_>, ResearchError>>()?;

    let provider = create_provider(&config.llm)?;
    let components = ResearchComponents::from_config(config, provider)
        .context("Failed to build HTTP clients")?;
    let session = ResearchSession::new();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling research");
            on_interrupt.cancel();
        }
    });

    let results = components
        .orchestrator
        .run_session(&session, &questions, &cancel)
        .await;

    let outcomes: Vec<QuestionReport> = questions
        .iter()
        .zip(results)
        .map(|(question, result)| match result {
            Ok(outcome) => QuestionReport::Finished(outcome),
            Err(e) => QuestionReport::Failed {
                question: question.to_string(),
                error: e.to_string(),
            },
        })
        .collect();
    let findings = session.dump().snapshot().await;

    if json {
        let report = ResearchReport {
            session: session.id().to_string(),
            outcomes,
            findings,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_research(&outcomes, &findings);
    }

    if let Some(dir) = out {
        let path = session.save(&dir).await?;
        eprintln!("Saved session to {}", path.display());
    }

    if cancel.is_cancelled() {
        anyhow::bail!("Research cancelled");
    }
    Ok(())
}

fn print_research(outcomes: &[QuestionReport], findings: &[QuestionFindings]) {
    for outcome in outcomes {
        match outcome {
            QuestionReport::Finished(o) if o.succeeded() => println!(
                "✓ {} ({} sources, {} skipped)",
                o.question,
                o.entries_added,
                o.skipped.len()
            ),
            QuestionReport::Finished(o) => println!("✗ {} (no findings)", o.question),
            QuestionReport::Failed { question, error } => println!("✗ {question}: {error}"),
        }
    }

    for finding in findings {
        println!("\n## {}\n", finding.question);
        for entry in &finding.entries {
            println!("- {} <{}>", entry.source.title, entry.source.url);
            println!("  {}\n", entry.summary);
        }
    }
}

async fn handle_search(
    query: &str,
    max_results: Option<usize>,
    json: bool,
    config: &DelveConfig,
) -> anyhow::Result<()> {
    let search = DuckDuckGoSearch::new(&config.search).context("Failed to build HTTP client")?;
    let hits = search
        .search(query, max_results.unwrap_or(config.search.max_results))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No results for \"{query}\".");
    }
    for (i, hit) in hits.iter().enumerate() {
        match &hit.title {
            Some(title) => println!("{}. {title}\n   {}", i + 1, hit.url),
            None => println!("{}. {}", i + 1, hit.url),
        }
    }
    Ok(())
}

async fn handle_fetch(
    url: &str,
    chunk_tokens: Option<usize>,
    json: bool,
    config: &DelveConfig,
) -> anyhow::Result<()> {
    let fetcher = HttpPageFetcher::new(&config.fetch).context("Failed to build HTTP client")?;

    let Some(max_tokens) = chunk_tokens else {
        let page = fetcher.fetch(url).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&page)?);
        } else {
            println!("# {}\n<{}>\n\n{}", page.title, page.url, page.content);
        }
        return Ok(());
    };

    let chunker = TextChunker::for_model(&config.chunking.model);
    let chunked = fetch_and_chunk(&fetcher, &chunker, url, max_tokens).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&chunked)?);
    } else {
        println!("# {}\n<{}>", chunked.page.title, chunked.page.url);
        print_chunks(&chunked.paragraph_chunks, &chunked.analysis);
    }
    Ok(())
}

async fn handle_chunk(
    file: &Path,
    max_tokens: Option<usize>,
    sentences: bool,
    config: &DelveConfig,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let max_tokens = max_tokens.unwrap_or(config.chunking.max_tokens);
    let chunker = TextChunker::for_model(&config.chunking.model);

    let chunks = if sentences {
        chunker.chunk_text(&text, max_tokens)
    } else {
        chunker.chunk_paragraphs(&split_paragraphs(&text), max_tokens)
    };
    print_chunks(&chunks, &ChunkAnalysis::from_chunks(&chunks));
    Ok(())
}

/// Split text into paragraphs at blank lines.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}

fn print_chunks(chunks: &[String], analysis: &ChunkAnalysis) {
    for (i, chunk) in chunks.iter().enumerate() {
        println!(
            "\n--- chunk {} ({} chars) ---\n{}",
            i + 1,
            chunk.chars().count(),
            chunk
        );
    }
    println!(
        "\n{} chunks, avg {:.0} chars (min {}, max {}); short {}, medium {}, long {}",
        analysis.chunk_count,
        analysis.avg_chars,
        analysis.min_chars,
        analysis.max_chars,
        analysis.short_chunks,
        analysis.medium_chunks,
        analysis.long_chunks
    );
}

fn handle_config(
    action: ConfigAction,
    config: &DelveConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
        ConfigAction::Init => {
            let config_dir = workspace.join(".delve");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&DelveConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
    }
}
