//! Durable watch state — per-source cursors plus the per-row decision
//! ledger.
//!
//! One JSON document on local disk, rewritten in full after every mutation.
//! The file write is the sole synchronization point for poll progress:
//! a crash mid-batch reprocesses at most the in-flight row. Missing or
//! unreadable state loads as empty — never fatal.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StateError;

/// Terminal-or-not status of one application row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl DecisionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// The persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    /// `source key → index of last fully processed data row` (0 = none).
    cursors: HashMap<String, u32>,
    /// `"<source key>:<absolute row>" → status`. Only terminal statuses are
    /// ever written; pending rows simply have no entry.
    #[serde(default)]
    decisions: HashMap<String, DecisionStatus>,
}

fn decision_key(source_key: &str, row: u32) -> String {
    format!("{source_key}:{row}")
}

/// Shared durable state, guarded by a mutex. Both the poller and the
/// decision engine mutate through this; each mutator persists before
/// returning.
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<PersistedState>,
}

impl StateStore {
    /// Load from `path`. No file, or a file that fails to parse, starts
    /// fresh with empty state.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let inner = match std::fs::read_to_string(&path) {
            Ok(raw) => parse_state(&raw).unwrap_or_else(|| {
                warn!(path = %path.display(), "State file unreadable, starting fresh");
                PersistedState::default()
            }),
            Err(_) => PersistedState::default(),
        };
        Self {
            path,
            inner: Mutex::new(inner),
        }
    }

    /// Last fully processed data-row index for a source (0 = none).
    pub fn cursor(&self, source_key: &str) -> u32 {
        let state = self.inner.lock().expect("state lock poisoned");
        state.cursors.get(source_key).copied().unwrap_or(0)
    }

    /// Advance a source's cursor and persist the full document. Cursors are
    /// monotonically non-decreasing; a stale value is ignored.
    pub fn advance_cursor(&self, source_key: &str, to: u32) -> Result<(), StateError> {
        let snapshot = {
            let mut state = self.inner.lock().expect("state lock poisoned");
            let entry = state.cursors.entry(source_key.to_string()).or_insert(0);
            if to <= *entry {
                return Ok(());
            }
            *entry = to;
            state.clone()
        };
        self.persist(&snapshot)
    }

    /// Current status of one row.
    pub fn decision_status(&self, source_key: &str, row: u32) -> DecisionStatus {
        let state = self.inner.lock().expect("state lock poisoned");
        state
            .decisions
            .get(&decision_key(source_key, row))
            .copied()
            .unwrap_or(DecisionStatus::Pending)
    }

    /// Atomically claim a row for a terminal decision.
    ///
    /// Returns `Ok(())` and persists if the row was still pending;
    /// returns the prior terminal status otherwise, in which case the
    /// caller must not execute any side effects.
    pub fn claim_decision(
        &self,
        source_key: &str,
        row: u32,
        status: DecisionStatus,
    ) -> Result<Result<(), DecisionStatus>, StateError> {
        debug_assert!(status.is_terminal());
        let snapshot = {
            let mut state = self.inner.lock().expect("state lock poisoned");
            let key = decision_key(source_key, row);
            if let Some(prior) = state.decisions.get(&key)
                && prior.is_terminal()
            {
                return Ok(Err(*prior));
            }
            state.decisions.insert(key, status);
            state.clone()
        };
        self.persist(&snapshot)?;
        Ok(Ok(()))
    }

    fn persist(&self, state: &PersistedState) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(state).map_err(|e| StateError::PersistFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(|e| StateError::PersistFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Parse the current layout, falling back to the legacy flat
/// `source key → cursor` map (pre-ledger deployments).
fn parse_state(raw: &str) -> Option<PersistedState> {
    if let Ok(state) = serde_json::from_str::<PersistedState>(raw) {
        return Some(state);
    }
    serde_json::from_str::<HashMap<String, u32>>(raw)
        .ok()
        .map(|cursors| PersistedState {
            cursors,
            decisions: HashMap::new(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::load(dir.path().join("state.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_starts_fresh() {
        let (_dir, store) = temp_store();
        assert_eq!(store.cursor("a_S"), 0);
        assert_eq!(store.decision_status("a_S", 2), DecisionStatus::Pending);
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = StateStore::load(&path);
        assert_eq!(store.cursor("a_S"), 0);
    }

    #[test]
    fn cursor_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::load(&path);
        store.advance_cursor("a_S", 3).unwrap();
        store.advance_cursor("b_S", 1).unwrap();

        let reloaded = StateStore::load(&path);
        assert_eq!(reloaded.cursor("a_S"), 3);
        assert_eq!(reloaded.cursor("b_S"), 1);
    }

    #[test]
    fn cursor_is_monotonic() {
        let (_dir, store) = temp_store();
        store.advance_cursor("a_S", 5).unwrap();
        store.advance_cursor("a_S", 2).unwrap();
        assert_eq!(store.cursor("a_S"), 5);
    }

    #[test]
    fn legacy_flat_map_loads_as_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"sheet1_Form Responses 1": 12, "sheet2_Form Responses 1": 0}"#)
            .unwrap();

        let store = StateStore::load(&path);
        assert_eq!(store.cursor("sheet1_Form Responses 1"), 12);
        assert_eq!(
            store.decision_status("sheet1_Form Responses 1", 5),
            DecisionStatus::Pending
        );
    }

    #[test]
    fn claim_decision_is_exactly_once() {
        let (_dir, store) = temp_store();

        let first = store
            .claim_decision("a_S", 5, DecisionStatus::Accepted)
            .unwrap();
        assert!(first.is_ok());

        let second = store
            .claim_decision("a_S", 5, DecisionStatus::Rejected)
            .unwrap();
        assert_eq!(second, Err(DecisionStatus::Accepted));
        assert_eq!(store.decision_status("a_S", 5), DecisionStatus::Accepted);
    }

    #[test]
    fn ledger_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::load(&path);
        store
            .claim_decision("a_S", 7, DecisionStatus::Rejected)
            .unwrap()
            .unwrap();

        let reloaded = StateStore::load(&path);
        assert_eq!(reloaded.decision_status("a_S", 7), DecisionStatus::Rejected);
    }
}
