//! Research pipeline: question → search queries → sources → summaries → dump.
//!
//! [`ResearchOrchestrator`] drives one run per question through
//! [`QueryExpander`], [`SourceFinder`], a [`PageFetcher`] and
//! [`ContextualSummarizer`], appending findings to a [`ResearchDump`] owned by
//! a [`ResearchSession`].

pub mod dump;
pub mod expander;
pub mod orchestrator;
pub mod retrieval;
pub mod session;
pub mod summarizer;
pub mod types;

pub use dump::{QuestionFindings, ResearchDump};
pub use expander::{QueryExpander, parse_queries};
pub use orchestrator::{ResearchOrchestrator, ResearchOutcome, SkippedSource};
pub use retrieval::{PageFetcher, SearchProvider, SourceFinder};
pub use session::{ResearchSession, SessionFlag, SessionSnapshot};
pub use summarizer::{
    ContextualSummarizer, PreparedInput, SummaryKind, SummaryOutcome, TRUNCATION_MARKER,
    prepare_input,
};
pub use types::{
    FetchedPage, ResearchDumpEntry, ResearchQuestion, SearchHit, SearchQuery, SourceRef, Summary,
};
