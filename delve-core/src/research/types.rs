//! Research domain values.

use crate::error::ResearchError;
use serde::{Deserialize, Serialize};

/// The topic driving one research run; the key under which findings accumulate.
///
/// Always non-blank and stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResearchQuestion(String);

impl ResearchQuestion {
    pub fn new(question: impl Into<String>) -> Result<Self, ResearchError> {
        let question = question.into();
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(ResearchError::EmptyQuestion);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResearchQuestion {
    type Error = ResearchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResearchQuestion> for String {
    fn from(q: ResearchQuestion) -> Self {
        q.0
    }
}

impl std::fmt::Display for ResearchQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A short keyword phrase submitted to a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A candidate source returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SearchHit {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Identifies a fetched page. `url` is the identity, `title` is cosmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// A question-anchored summary. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Summary(String);

impl Summary {
    /// Returns `None` for blank text.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl TryFrom<String> for Summary {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "summary must not be empty".to_string())
    }
}

impl From<Summary> for String {
    fn from(s: Summary) -> Self {
        s.0
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One finding stored under a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchDumpEntry {
    pub source: SourceRef,
    pub summary: Summary,
}

/// A fetched page after boilerplate removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub title: String,
    /// Normalized body text, capped in length.
    pub content: String,
    /// Individual paragraph texts, for chunk-based consumers.
    pub paragraphs: Vec<String>,
}

impl FetchedPage {
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_rejects_blank() {
        assert!(matches!(
            ResearchQuestion::new("   \n"),
            Err(ResearchError::EmptyQuestion)
        ));
        assert!(matches!(
            ResearchQuestion::new(""),
            Err(ResearchError::EmptyQuestion)
        ));
    }

    #[test]
    fn test_question_trimmed() {
        let q = ResearchQuestion::new("  EV adoption in Norway?  ").unwrap();
        assert_eq!(q.as_str(), "EV adoption in Norway?");
        assert_eq!(q.to_string(), "EV adoption in Norway?");
    }

    #[test]
    fn test_question_deserialize_validates() {
        let ok: ResearchQuestion = serde_json::from_str("\"Why?\"").unwrap();
        assert_eq!(ok.as_str(), "Why?");
        assert!(serde_json::from_str::<ResearchQuestion>("\"  \"").is_err());
    }

    #[test]
    fn test_summary_never_empty() {
        assert!(Summary::new("").is_none());
        assert!(Summary::new(" \t").is_none());
        let s = Summary::new(" Sales grew 40% in 2023. ").unwrap();
        assert_eq!(s.as_str(), "Sales grew 40% in 2023.");
        assert_eq!(s.word_count(), 5);
        assert!(serde_json::from_str::<Summary>("\"\"").is_err());
    }

    #[test]
    fn test_search_hit_title_optional_in_json() {
        let hit = SearchHit::new("https://example.com");
        let json = serde_json::to_string(&hit).unwrap();
        assert_eq!(json, r#"{"url":"https://example.com"}"#);
        let titled = hit.with_title("Example");
        assert_eq!(titled.title.as_deref(), Some("Example"));
    }

    #[test]
    fn test_fetched_page_source_ref() {
        let page = FetchedPage {
            url: "https://example.com/a".into(),
            title: "A".into(),
            content: "text".into(),
            paragraphs: vec![],
        };
        assert_eq!(
            page.source_ref(),
            SourceRef {
                title: "A".into(),
                url: "https://example.com/a".into()
            }
        );
    }
}
