//! Error types for the core module.

use thiserror::Error;

use crate::status::AgentStatus;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while mutating project state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: AgentStatus, to: AgentStatus },

    #[error("Cannot enter {status}: missing {missing}")]
    MissingPrecondition {
        status: AgentStatus,
        missing: &'static str,
    },

    #[error("A run is already in progress (status: {0})")]
    RunInProgress(AgentStatus),

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Snapshot mode is read-only; return to live state first")]
    SnapshotModeReadOnly,

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Plugin is disabled: {0}")]
    PluginDisabled(String),

    #[error("File not found in virtual file system: {0}")]
    FileNotFound(String),

    #[error("Unknown design token: {0}")]
    UnknownToken(String),

    #[error("Design system has not been generated yet")]
    NoDesignSystem,
}
