//! Token-budgeted text chunking.
//!
//! Paragraphs (or sentences of a text blob) are packed greedily, in order,
//! into chunks whose token count stays within a budget. A single unit that
//! is already over budget becomes its own chunk; nothing is split or dropped.

use crate::brain::TokenCounter;
use serde::{Deserialize, Serialize};

/// Chunks shorter than this many characters count as short.
const SHORT_CHUNK_CHARS: usize = 100;
/// Chunks shorter than this many characters (and not short) count as medium.
const MEDIUM_CHUNK_CHARS: usize = 500;

/// Greedy token-budget chunker.
#[derive(Debug, Clone)]
pub struct TextChunker {
    counter: TokenCounter,
    model: String,
}

impl TextChunker {
    /// Create a chunker with an explicit counting strategy.
    pub fn new(counter: TokenCounter) -> Self {
        let model = if counter.is_exact() { "bpe" } else { "approximate" };
        Self {
            counter,
            model: model.to_string(),
        }
    }

    /// Create a chunker using the tokenizer for `model`, approximating when unknown.
    pub fn for_model(model: &str) -> Self {
        let counter = TokenCounter::for_model(model);
        let model = if counter.is_exact() {
            model.to_string()
        } else {
            tracing::warn!(model, "Tokenizer unavailable, using chars/4 approximation");
            "approximate".to_string()
        };
        Self { counter, model }
    }

    /// Name of the tokenizer in use, or `"approximate"`.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Pack paragraphs into chunks of at most `max_tokens` tokens.
    ///
    /// Blank paragraphs are skipped. Paragraphs in a chunk are joined with a
    /// single space.
    pub fn chunk_paragraphs<S: AsRef<str>>(&self, paragraphs: &[S], max_tokens: usize) -> Vec<String> {
        self.pack(
            paragraphs
                .iter()
                .map(|p| p.as_ref())
                .filter(|p| !p.trim().is_empty()),
            max_tokens,
        )
    }

    /// Split `text` into sentences and pack them like paragraphs.
    pub fn chunk_text(&self, text: &str, max_tokens: usize) -> Vec<String> {
        self.pack(split_sentences(text).into_iter(), max_tokens)
    }

    fn pack<'a>(&self, units: impl Iterator<Item = &'a str>, max_tokens: usize) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for unit in units {
            if current.is_empty() {
                current.push_str(unit);
                continue;
            }
            // budget covers the joined text, separator included
            let candidate = format!("{current} {unit}");
            if self.count_tokens(&candidate) > max_tokens {
                chunks.push(std::mem::replace(&mut current, unit.to_string()));
            } else {
                current = candidate;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Split text into trimmed, non-blank sentence-like units.
///
/// A unit ends after a run of `.`, `!` or `?`; the terminators stay with it.
/// Trailing text without a terminator forms the last unit.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !is_terminator(ch) {
            continue;
        }
        let next_is_terminator = chars.peek().is_some_and(|&(_, next)| is_terminator(next));
        if !next_is_terminator {
            let end = idx + ch.len_utf8();
            push_unit(&mut units, &text[start..end]);
            start = end;
        }
    }
    push_unit(&mut units, &text[start..]);
    units
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn push_unit<'a>(units: &mut Vec<&'a str>, raw: &'a str) {
    let unit = raw.trim();
    if !unit.is_empty() {
        units.push(unit);
    }
}

/// Size statistics over a list of chunks, measured in characters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    pub chunk_count: usize,
    pub total_chars: usize,
    pub avg_chars: f64,
    pub min_chars: usize,
    pub max_chars: usize,
    /// Fewer than 100 characters.
    pub short_chunks: usize,
    /// 100 to 499 characters.
    pub medium_chunks: usize,
    /// 500 characters or more.
    pub long_chunks: usize,
}

impl ChunkAnalysis {
    pub fn from_chunks<S: AsRef<str>>(chunks: &[S]) -> Self {
        let lengths: Vec<usize> = chunks.iter().map(|c| c.as_ref().chars().count()).collect();
        if lengths.is_empty() {
            return Self::default();
        }

        let total_chars: usize = lengths.iter().sum();
        Self {
            chunk_count: lengths.len(),
            total_chars,
            avg_chars: total_chars as f64 / lengths.len() as f64,
            min_chars: lengths.iter().copied().min().unwrap_or(0),
            max_chars: lengths.iter().copied().max().unwrap_or(0),
            short_chunks: lengths.iter().filter(|&&l| l < SHORT_CHUNK_CHARS).count(),
            medium_chunks: lengths
                .iter()
                .filter(|&&l| (SHORT_CHUNK_CHARS..MEDIUM_CHUNK_CHARS).contains(&l))
                .count(),
            long_chunks: lengths.iter().filter(|&&l| l >= MEDIUM_CHUNK_CHARS).count(),
        }
    }
}
