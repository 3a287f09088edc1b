//! Delve CLI: question-driven web research from the terminal.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Delve: research questions on the web and collect cited summaries
#[derive(Parser, Debug)]
#[command(name = "delve", version, about, long_about = None)]
struct Cli {
    /// LLM model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Research one or more questions (Ctrl-C cancels)
    Research {
        /// Questions to research
        #[arg(required = true)]
        questions: Vec<String>,

        /// Print the outcome and findings as JSON
        #[arg(long)]
        json: bool,

        /// Save the session snapshot under this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Search the web and list candidate URLs
    Search {
        query: String,

        /// Number of results (defaults to search.max_results)
        #[arg(short = 'n', long)]
        max_results: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Fetch a page and print its extracted text
    Fetch {
        url: String,

        /// Also split the page into chunks of this many tokens
        #[arg(long)]
        chunk_tokens: Option<usize>,

        #[arg(long)]
        json: bool,
    },
    /// Chunk a local text file
    Chunk {
        file: PathBuf,

        /// Token budget per chunk (defaults to chunking.max_tokens)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Split by sentences instead of blank-line paragraphs
        #[arg(long)]
        sentences: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Show the merged configuration
    Show,
    /// Write a default configuration to .delve/config.toml
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = delve_core::config::data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "delve.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = delve_core::config::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    commands::handle_command(cli.command, config, &workspace).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_research_with_globals() {
        let cli = Cli::try_parse_from([
            "delve",
            "-vv",
            "research",
            "How fast are EV sales growing?",
            "What limits battery supply?",
            "--json",
            "--out",
            "runs",
            "-m",
            "gpt-4o",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
        match cli.command {
            Commands::Research {
                questions,
                json,
                out,
            } => {
                assert_eq!(questions.len(), 2);
                assert!(json);
                assert_eq!(out, Some(PathBuf::from("runs")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_research_requires_a_question() {
        assert!(Cli::try_parse_from(["delve", "research"]).is_err());
    }

    #[test]
    fn test_parse_chunk_and_config() {
        let cli = Cli::try_parse_from([
            "delve",
            "chunk",
            "notes.txt",
            "--max-tokens",
            "64",
            "--sentences",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chunk {
                max_tokens: Some(64),
                sentences: true,
                ..
            }
        ));

        let cli = Cli::try_parse_from(["delve", "-q", "config", "show"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
