//! Research session: the dump, the plan, and workflow flags for one user session.
//!
//! Constructed by the composition root and passed to whoever needs it; there is
//! no process-wide instance.

use super::dump::{QuestionFindings, ResearchDump};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Workflow milestones tracked by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFlag {
    /// Clarification gathered enough context to plan.
    HasEnoughContext,
    PlanGenerated,
    PlanFinalized,
    /// The last batch of research questions completed.
    ResearchFinished,
    ReportGenerated,
}

impl SessionFlag {
    pub const ALL: [SessionFlag; 5] = [
        SessionFlag::HasEnoughContext,
        SessionFlag::PlanGenerated,
        SessionFlag::PlanFinalized,
        SessionFlag::ResearchFinished,
        SessionFlag::ReportGenerated,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for SessionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionFlag::HasEnoughContext => "has_enough_context",
            SessionFlag::PlanGenerated => "plan_generated",
            SessionFlag::PlanFinalized => "plan_finalized",
            SessionFlag::ResearchFinished => "research_finished",
            SessionFlag::ReportGenerated => "report_generated",
        };
        f.write_str(name)
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub plan: String,
    /// Flags that are set.
    pub flags: Vec<SessionFlag>,
    pub findings: Vec<QuestionFindings>,
}

/// State shared by the research pipeline and its consumers for one session.
pub struct ResearchSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    dump: Arc<ResearchDump>,
    plan: RwLock<String>,
    flags: [AtomicBool; SessionFlag::ALL.len()],
}

impl ResearchSession {
    pub fn new() -> Self {
        Self::with_dump(Arc::new(ResearchDump::new()))
    }

    /// Start a session around an existing dump.
    pub fn with_dump(dump: Arc<ResearchDump>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            dump,
            plan: RwLock::new(String::new()),
            flags: Default::default(),
        }
    }

    /// Rebuild a session from a saved snapshot.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let session = Self {
            id: snapshot.id,
            created_at: snapshot.created_at,
            dump: Arc::new(ResearchDump::from_findings(snapshot.findings)),
            plan: RwLock::new(snapshot.plan),
            flags: Default::default(),
        };
        for flag in snapshot.flags {
            session.set(flag);
        }
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The shared dump; hand clones of this to research runs.
    pub fn dump(&self) -> &Arc<ResearchDump> {
        &self.dump
    }

    pub fn store_plan(&self, plan: impl Into<String>) {
        *self.plan.write().unwrap_or_else(|p| p.into_inner()) = plan.into();
    }

    pub fn plan(&self) -> String {
        self.plan.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn clear_plan(&self) {
        self.plan.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    pub fn set(&self, flag: SessionFlag) {
        self.flags[flag.index()].store(true, Ordering::SeqCst);
    }

    pub fn clear(&self, flag: SessionFlag) {
        self.flags[flag.index()].store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self, flag: SessionFlag) -> bool {
        self.flags[flag.index()].load(Ordering::SeqCst)
    }

    /// Clear findings and the research-finished flag before a new run.
    pub async fn reset_research(&self) {
        self.dump.clear().await;
        self.clear(SessionFlag::ResearchFinished);
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            saved_at: Utc::now(),
            plan: self.plan(),
            flags: SessionFlag::ALL
                .into_iter()
                .filter(|f| self.is_set(*f))
                .collect(),
            findings: self.dump.snapshot().await,
        }
    }

    /// Where [`save`](Self::save) writes this session under `base_dir`.
    pub fn snapshot_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join("research").join(format!("{}.json", self.id))
    }

    /// Persist the session to `<base_dir>/research/<id>.json`.
    pub async fn save(&self, base_dir: &Path) -> std::io::Result<PathBuf> {
        let path = self.snapshot_path(base_dir);
        let snapshot = self.snapshot().await;
        crate::persistence::atomic_write_json(&path, &snapshot)?;
        tracing::debug!(session = %self.id, path = %path.display(), "Saved research session");
        Ok(path)
    }

    /// Load a snapshot written by [`save`](Self::save).
    pub fn load_snapshot(path: &Path) -> std::io::Result<SessionSnapshot> {
        crate::persistence::load_json(path)?.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no saved session at {}", path.display()),
            )
        })
    }
}

impl Default for ResearchSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::types::{ResearchDumpEntry, ResearchQuestion, SourceRef, Summary};

    fn entry(url: &str) -> ResearchDumpEntry {
        ResearchDumpEntry {
            source: SourceRef {
                title: "T".into(),
                url: url.into(),
            },
            summary: Summary::new("A finding.").unwrap(),
        }
    }

    #[test]
    fn test_flags_start_clear() {
        let session = ResearchSession::new();
        for flag in SessionFlag::ALL {
            assert!(!session.is_set(flag));
        }
    }

    #[test]
    fn test_flags_independent() {
        let session = ResearchSession::new();
        session.set(SessionFlag::PlanGenerated);
        assert!(session.is_set(SessionFlag::PlanGenerated));
        assert!(!session.is_set(SessionFlag::PlanFinalized));
        session.clear(SessionFlag::PlanGenerated);
        assert!(!session.is_set(SessionFlag::PlanGenerated));
    }

    #[test]
    fn test_plan_store_and_clear() {
        let session = ResearchSession::new();
        session.store_plan("1. Market size\n2. Growth");
        assert_eq!(session.plan(), "1. Market size\n2. Growth");
        session.clear_plan();
        assert!(session.plan().is_empty());
    }

    #[test]
    fn test_flag_display() {
        assert_eq!(SessionFlag::HasEnoughContext.to_string(), "has_enough_context");
        assert_eq!(SessionFlag::ReportGenerated.to_string(), "report_generated");
    }

    #[tokio::test]
    async fn test_reset_research_clears_dump_and_finished_flag() {
        let session = ResearchSession::new();
        let q = ResearchQuestion::new("Q").unwrap();
        session.dump().append(&q, vec![entry("https://a")]).await;
        session.set(SessionFlag::ResearchFinished);
        session.set(SessionFlag::PlanFinalized);

        session.reset_research().await;

        assert!(session.dump().is_empty().await);
        assert!(!session.is_set(SessionFlag::ResearchFinished));
        assert!(session.is_set(SessionFlag::PlanFinalized));
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let session = ResearchSession::new();
        let q = ResearchQuestion::new("EV sales in Norway").unwrap();
        session
            .dump()
            .append(&q, vec![entry("https://a"), entry("https://b")])
            .await;
        session.store_plan("plan");
        session.set(SessionFlag::ResearchFinished);

        let path = session.save(dir.path()).await.unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("research")
                .join(format!("{}.json", session.id()))
        );

        let snapshot = ResearchSession::load_snapshot(&path).unwrap();
        assert_eq!(snapshot.id, session.id());
        assert_eq!(snapshot.plan, "plan");
        assert_eq!(snapshot.flags, vec![SessionFlag::ResearchFinished]);
        assert_eq!(snapshot.findings.len(), 1);
        assert_eq!(snapshot.findings[0].entries.len(), 2);

        let restored = ResearchSession::from_snapshot(snapshot);
        assert_eq!(restored.id(), session.id());
        assert!(restored.is_set(SessionFlag::ResearchFinished));
        assert_eq!(restored.dump().entries_for(&q).await.len(), 2);
    }

    #[test]
    fn test_load_snapshot_missing() {
        let err = ResearchSession::load_snapshot(Path::new("/nonexistent/s.json")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
