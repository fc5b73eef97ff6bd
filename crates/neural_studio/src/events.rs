//! State-change notifications.

use serde::Serialize;

use neural_core::AgentStatus;

/// Emitted by the store after every committed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StateEvent {
    StatusChanged { generation: u64, status: AgentStatus },
    SnapshotCaptured { id: String, label: String },
    LogAppended { line: String },
    FileWritten { path: String },
    CurrentFileChanged { path: Option<String> },
    HistorySelected { id: Option<String> },
    RolledBack { id: String },
    PluginToggled { id: String, enabled: bool },
    ThemeUpdated { path: String, value: String },
    Saved,
    Reset,
}

/// Latest status as seen by the orchestrator.
///
/// `seq` increases on every publication, so re-entering a status (the
/// heal loop enters `compiling` twice) is still a distinct tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTick {
    pub generation: u64,
    pub seq: u64,
    pub status: AgentStatus,
}
