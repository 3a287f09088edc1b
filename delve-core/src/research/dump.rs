//! The research dump: per-question store of findings.
//!
//! Grows monotonically during a session. Concurrent research runs append
//! through a single lock, one critical section per append, so no entry is
//! ever lost or interleaved with another run's batch.

use super::types::{ResearchDumpEntry, ResearchQuestion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct DumpState {
    entries: HashMap<ResearchQuestion, Vec<ResearchDumpEntry>>,
    /// Questions in first-append order.
    order: Vec<ResearchQuestion>,
}

/// Findings for one question, as exported by [`ResearchDump::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFindings {
    pub question: ResearchQuestion,
    pub entries: Vec<ResearchDumpEntry>,
}

/// Accumulating store of `(SourceRef, Summary)` entries keyed by question.
#[derive(Default)]
pub struct ResearchDump {
    state: RwLock<DumpState>,
}

impl ResearchDump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a dump from exported findings.
    pub fn from_findings(findings: Vec<QuestionFindings>) -> Self {
        let mut state = DumpState::default();
        for QuestionFindings { question, entries } in findings {
            if entries.is_empty() {
                continue;
            }
            match state.entries.get_mut(&question) {
                Some(existing) => existing.extend(entries),
                None => {
                    state.order.push(question.clone());
                    state.entries.insert(question, entries);
                }
            }
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Extend the question's list with `entries` in one step.
    ///
    /// An empty batch is a no-op and does not create the key.
    /// Returns the question's entry count after the append.
    pub async fn append(
        &self,
        question: &ResearchQuestion,
        entries: Vec<ResearchDumpEntry>,
    ) -> usize {
        if entries.is_empty() {
            return self.entries_for(question).await.len();
        }
        let mut state = self.state.write().await;
        let DumpState {
            entries: map,
            order,
        } = &mut *state;
        let list = map.entry(question.clone()).or_insert_with(|| {
            order.push(question.clone());
            Vec::new()
        });
        list.extend(entries);
        list.len()
    }

    /// The question's entries in completion order; empty when absent.
    pub async fn entries_for(&self, question: &ResearchQuestion) -> Vec<ResearchDumpEntry> {
        self.state
            .read()
            .await
            .entries
            .get(question)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn contains(&self, question: &ResearchQuestion) -> bool {
        self.state.read().await.entries.contains_key(question)
    }

    /// Questions with at least one entry, in first-append order.
    pub async fn questions(&self) -> Vec<ResearchQuestion> {
        self.state.read().await.order.clone()
    }

    /// Full copy of the store, questions in first-append order.
    pub async fn snapshot(&self) -> Vec<QuestionFindings> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .map(|q| QuestionFindings {
                question: q.clone(),
                entries: state.entries.get(q).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Number of questions with findings.
    pub async fn len(&self) -> usize {
        self.state.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.order.is_empty()
    }

    pub async fn total_entries(&self) -> usize {
        self.state.read().await.entries.values().map(Vec::len).sum()
    }

    /// Drop every finding. Only called between research runs.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.order.clear();
    }
}
