//! Agent status and the stage transition table.
//!
//! The pipeline is a fixed sequence of stages. Every status change goes
//! through [`AgentStatus::can_transition_to`]; moves outside the table are
//! rejected instead of silently running a handler from an unexpected state.
//!
//! ```text
//! idle ─▶ managing ─▶ planning ─▶ designing ─▶ architecting ─▶ coding
//!            ▲                                                   │
//!            │                                                   ▼
//!   ready / error ◀── compiling ◀──────────────────────────── reviewing
//!                       │   ▲
//!                       ▼   │
//!                      healing
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Managing,
    Planning,
    Designing,
    Architecting,
    Coding,
    Reviewing,
    Compiling,
    Healing,
    Ready,
    Error,
}

impl AgentStatus {
    /// Stages in the order a successful run visits them.
    pub const PIPELINE: [AgentStatus; 7] = [
        AgentStatus::Managing,
        AgentStatus::Planning,
        AgentStatus::Designing,
        AgentStatus::Architecting,
        AgentStatus::Coding,
        AgentStatus::Reviewing,
        AgentStatus::Compiling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Managing => "managing",
            Self::Planning => "planning",
            Self::Designing => "designing",
            Self::Architecting => "architecting",
            Self::Coding => "coding",
            Self::Reviewing => "reviewing",
            Self::Compiling => "compiling",
            Self::Healing => "healing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Label used for the automatic history snapshot taken on entry.
    ///
    /// Returns `None` for `idle`, `ready` and `error`, which never
    /// produce a snapshot.
    pub fn milestone_label(&self) -> Option<&'static str> {
        match self {
            Self::Managing => Some("Requirements Analysis"),
            Self::Planning => Some("Feature Planning"),
            Self::Designing => Some("Design System"),
            Self::Architecting => Some("Architecture Scaffold"),
            Self::Coding => Some("Code Generation"),
            Self::Reviewing => Some("Code Review"),
            Self::Compiling => Some("Build"),
            Self::Healing => Some("Self-Healing Patch"),
            Self::Idle | Self::Ready | Self::Error => None,
        }
    }

    /// Name of the agent that owns this stage.
    pub fn agent_name(&self) -> Option<&'static str> {
        match self {
            Self::Managing => Some("manager"),
            Self::Planning => Some("planner"),
            Self::Designing => Some("designer"),
            Self::Architecting => Some("architect"),
            Self::Coding => Some("coder"),
            Self::Reviewing => Some("reviewer"),
            Self::Compiling => Some("compiler"),
            Self::Healing => Some("patcher"),
            Self::Idle | Self::Ready | Self::Error => None,
        }
    }

    /// Whether a stage handler is bound to this status.
    pub fn is_active(&self) -> bool {
        !self.is_settled()
    }

    /// Terminal (or initial) states where the orchestrator has nothing to do.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Ready | Self::Error)
    }

    /// Whether the user may start a new run from this status.
    pub fn can_start_run(&self) -> bool {
        self.is_settled()
    }

    /// Statuses reachable from this one.
    pub fn successors(&self) -> &'static [AgentStatus] {
        use AgentStatus::*;
        match self {
            Idle => &[Managing],
            Managing => &[Planning, Error],
            Planning => &[Designing, Error],
            Designing => &[Architecting, Error],
            Architecting => &[Coding, Error],
            Coding => &[Reviewing, Error],
            Reviewing => &[Compiling, Error],
            Compiling => &[Healing, Ready, Error],
            Healing => &[Compiling, Error],
            Ready => &[Managing],
            Error => &[Managing],
        }
    }

    /// Check a move against the transition table.
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_chain_is_allowed() {
        let mut current = AgentStatus::Idle;
        for next in AgentStatus::PIPELINE {
            assert!(current.can_transition_to(next), "{} -> {}", current, next);
            current = next;
        }
        assert!(current.can_transition_to(AgentStatus::Ready));
    }

    #[test]
    fn test_stages_cannot_be_skipped() {
        assert!(!AgentStatus::Managing.can_transition_to(AgentStatus::Designing));
        assert!(!AgentStatus::Planning.can_transition_to(AgentStatus::Coding));
        assert!(!AgentStatus::Idle.can_transition_to(AgentStatus::Ready));
        assert!(!AgentStatus::Healing.can_transition_to(AgentStatus::Ready));
    }

    #[test]
    fn test_settled_states() {
        assert!(AgentStatus::Idle.can_start_run());
        assert!(AgentStatus::Ready.can_start_run());
        assert!(AgentStatus::Error.can_start_run());
        assert!(!AgentStatus::Coding.can_start_run());
        assert!(AgentStatus::Healing.is_active());
    }

    #[test]
    fn test_milestone_labels() {
        for status in AgentStatus::PIPELINE {
            assert!(status.milestone_label().is_some());
        }
        assert!(AgentStatus::Ready.milestone_label().is_none());
        assert!(AgentStatus::Error.milestone_label().is_none());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&AgentStatus::Architecting).unwrap();
        assert_eq!(json, "\"architecting\"");
        let parsed: AgentStatus = serde_json::from_str("\"healing\"").unwrap();
        assert_eq!(parsed, AgentStatus::Healing);
    }
}
