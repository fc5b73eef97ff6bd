//! History snapshots: capture, read-only selection and rollback.
//!
//! Snapshots own deep copies of everything they freeze, so later live-state
//! mutations can never leak into them. The timeline is append-only; rollback
//! copies a snapshot back into live state without truncating it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{DesignSystem, FileSystem, ReviewReport};
use crate::state::ProjectState;
use crate::status::AgentStatus;

/// Immutable capture of generation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub id: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub status: AgentStatus,
    #[serde(default)]
    pub file_system: FileSystem,
    #[serde(default)]
    pub design_system: Option<DesignSystem>,
    #[serde(default)]
    pub terminal_logs: Vec<String>,
    #[serde(default)]
    pub review_report: Option<ReviewReport>,
}

impl ProjectState {
    /// Append a deep copy of the current generation state.
    pub fn capture_snapshot(&mut self, label: impl Into<String>) -> &HistorySnapshot {
        let snapshot = HistorySnapshot {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            timestamp: Utc::now(),
            status: self.status,
            file_system: self.file_system.clone(),
            design_system: self.design_system.clone(),
            terminal_logs: self.terminal_logs.clone(),
            review_report: self.active_review.clone(),
        };
        self.history.push(snapshot);
        &self.history[self.history.len() - 1]
    }

    pub fn find_snapshot(&self, id: &str) -> Option<&HistorySnapshot> {
        self.history.iter().find(|s| s.id == id)
    }

    /// The snapshot being displayed, if in snapshot mode.
    pub fn selected_snapshot(&self) -> Option<&HistorySnapshot> {
        self.selected_history_id
            .as_deref()
            .and_then(|id| self.find_snapshot(id))
    }

    /// Enter snapshot mode for `id`, or return to live state with `None`.
    pub fn select_history(&mut self, id: Option<&str>) -> CoreResult<()> {
        match id {
            Some(id) => {
                if self.find_snapshot(id).is_none() {
                    return Err(CoreError::SnapshotNotFound(id.to_string()));
                }
                self.selected_history_id = Some(id.to_string());
            }
            None => self.selected_history_id = None,
        }
        self.repair_cursor();
        Ok(())
    }

    /// Copy a snapshot's files, design and review back into live state.
    ///
    /// Forces `status = ready` and leaves snapshot mode. Later history
    /// entries are kept.
    pub fn rollback(&mut self, id: &str) -> CoreResult<()> {
        let snapshot = self
            .find_snapshot(id)
            .cloned()
            .ok_or_else(|| CoreError::SnapshotNotFound(id.to_string()))?;

        self.file_system = snapshot.file_system;
        self.design_system = snapshot.design_system;
        self.active_review = snapshot.review_report;
        self.status = AgentStatus::Ready;
        self.selected_history_id = None;
        self.repair_cursor();
        self.log(format!(
            "[system] Rolled back to \"{}\" ({})",
            snapshot.label,
            snapshot.timestamp.format("%H:%M:%S")
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{NeuralPlugin, PluginHook};

    fn state_with_files() -> ProjectState {
        let mut state = ProjectState::new();
        state.write_file("src/App.tsx", "v1");
        state.write_file("src/lib/mockData.ts", "data");
        state.current_file = Some("src/App.tsx".to_string());
        state
    }

    #[test]
    fn test_snapshot_is_independent_of_live_state() {
        let mut state = state_with_files();
        let id = state.capture_snapshot("first").id.clone();

        state.write_file("src/App.tsx", "v2");
        state.write_file("src/new.ts", "new");
        state.log("later line");

        let snapshot = state.find_snapshot(&id).unwrap();
        assert_eq!(snapshot.file_system["src/App.tsx"], "v1");
        assert!(!snapshot.file_system.contains_key("src/new.ts"));
        assert!(!snapshot.terminal_logs.contains(&"later line".to_string()));
    }

    #[test]
    fn test_snapshot_ids_unique() {
        let mut state = ProjectState::new();
        let a = state.capture_snapshot("a").id.clone();
        let b = state.capture_snapshot("b").id.clone();
        assert_ne!(a, b);
        assert_eq!(state.history.len(), 2);
    }

    #[test]
    fn test_select_history_switches_active_view() {
        let mut state = state_with_files();
        let id = state.capture_snapshot("first").id.clone();
        state.write_file("src/App.tsx", "v2");

        state.select_history(Some(&id)).unwrap();
        assert!(state.is_snapshot_mode());
        assert_eq!(state.active_file_system()["src/App.tsx"], "v1");
        assert_eq!(
            state.edit_file("src/App.tsx", "x"),
            Err(CoreError::SnapshotModeReadOnly)
        );

        state.select_history(None).unwrap();
        assert_eq!(state.active_file_system()["src/App.tsx"], "v2");
    }

    #[test]
    fn test_plugin_registry_is_read_only_in_snapshot_mode() {
        let mut state = state_with_files();
        let id = state.capture_snapshot("first").id.clone();
        state.select_history(Some(&id)).unwrap();

        assert_eq!(
            state.toggle_plugin("perf-optimizer"),
            Err(CoreError::SnapshotModeReadOnly)
        );
        assert_eq!(
            state.install_plugins(vec![NeuralPlugin::new(
                "lint",
                "Lint",
                "d",
                PluginHook::PostCoding
            )]),
            Err(CoreError::SnapshotModeReadOnly)
        );
        assert!(state.find_plugin("lint").is_err());
        assert!(!state.find_plugin("perf-optimizer").unwrap().enabled);

        state.select_history(None).unwrap();
        assert_eq!(state.toggle_plugin("perf-optimizer"), Ok(true));
    }

    #[test]
    fn test_select_unknown_snapshot() {
        let mut state = ProjectState::new();
        assert_eq!(
            state.select_history(Some("missing")),
            Err(CoreError::SnapshotNotFound("missing".to_string()))
        );
        assert!(!state.is_snapshot_mode());
    }

    #[test]
    fn test_selecting_snapshot_repairs_cursor() {
        let mut state = ProjectState::new();
        state.write_file("a.ts", "a");
        let id = state.capture_snapshot("only a").id.clone();
        state.write_file("b.ts", "b");
        state.current_file = Some("b.ts".to_string());

        state.select_history(Some(&id)).unwrap();
        assert_eq!(state.current_file.as_deref(), Some("a.ts"));
    }

    #[test]
    fn test_rollback_is_idempotent_and_non_destructive() {
        let mut state = state_with_files();
        state.design_system = Some(DesignSystem::fallback("todo"));
        let id = state.capture_snapshot("first").id.clone();

        state.write_file("src/App.tsx", "v2");
        state.design_system = None;
        state.capture_snapshot("second");
        state.status = AgentStatus::Error;

        state.rollback(&id).unwrap();
        let files_once = state.file_system.clone();
        let design_once = state.design_system.clone();
        let history_len = state.history.len();

        state.rollback(&id).unwrap();
        assert_eq!(state.file_system, files_once);
        assert_eq!(state.design_system, design_once);
        assert_eq!(state.history.len(), history_len);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.status, AgentStatus::Ready);
        assert_eq!(state.file_system["src/App.tsx"], "v1");
    }

    #[test]
    fn test_rollback_exits_snapshot_mode() {
        let mut state = state_with_files();
        let id = state.capture_snapshot("first").id.clone();
        state.select_history(Some(&id)).unwrap();

        state.rollback(&id).unwrap();
        assert!(!state.is_snapshot_mode());
    }
}
