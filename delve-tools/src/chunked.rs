//! Fetch a page and split it into token-budgeted chunks.

use delve_core::chunker::{ChunkAnalysis, TextChunker};
use delve_core::error::FetchError;
use delve_core::research::{FetchedPage, PageFetcher};
use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::{info, warn};

/// A fetched page with its chunkings.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkedPage {
    pub page: FetchedPage,
    pub max_tokens: usize,
    /// Paragraphs packed into chunks.
    pub paragraph_chunks: Vec<String>,
    /// Sentences of the full content packed into chunks.
    pub content_chunks: Vec<String>,
    /// Statistics over `paragraph_chunks`.
    pub analysis: ChunkAnalysis,
}

/// Fetch `url` and chunk both its paragraphs and its content.
pub async fn fetch_and_chunk(
    fetcher: &dyn PageFetcher,
    chunker: &TextChunker,
    url: &str,
    max_tokens: usize,
) -> Result<ChunkedPage, FetchError> {
    let page = fetcher.fetch(url).await?;
    let paragraph_chunks = chunker.chunk_paragraphs(&page.paragraphs, max_tokens);
    let content_chunks = chunker.chunk_text(&page.content, max_tokens);
    let analysis = ChunkAnalysis::from_chunks(&paragraph_chunks);

    info!(
        url,
        tokenizer = chunker.model(),
        paragraph_chunks = paragraph_chunks.len(),
        content_chunks = content_chunks.len(),
        "Chunked page"
    );
    Ok(ChunkedPage {
        page,
        max_tokens,
        paragraph_chunks,
        content_chunks,
        analysis,
    })
}

/// Fetch and chunk several URLs, at most `concurrency` at a time.
///
/// Results are returned in input order, one per URL.
pub async fn fetch_and_chunk_many(
    fetcher: &dyn PageFetcher,
    chunker: &TextChunker,
    urls: &[String],
    max_tokens: usize,
    concurrency: usize,
) -> Vec<(String, Result<ChunkedPage, FetchError>)> {
    let results: Vec<_> = stream::iter(urls)
        .map(|url| async move {
            let result = fetch_and_chunk(fetcher, chunker, url, max_tokens).await;
            if let Err(e) = &result {
                warn!(url = %url, error = %e, "Chunked fetch failed");
            }
            (url.clone(), result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!(total = urls.len(), failed, "Chunked fetch batch complete");
    results
}
