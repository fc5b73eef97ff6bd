//! Agent role definitions.

use serde::{Deserialize, Serialize};

use neural_core::AgentStatus;

/// LLM-backed roles in the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Manager,
    Planner,
    Designer,
    Coder,
    Reviewer,
    Patcher,
    Plugin,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Manager => "manager",
            AgentRole::Planner => "planner",
            AgentRole::Designer => "designer",
            AgentRole::Coder => "coder",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Patcher => "patcher",
            AgentRole::Plugin => "plugin",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentRole::Manager => "Turns the user's intent into a requirements document",
            AgentRole::Planner => "Breaks requirements into features, files and dependencies",
            AgentRole::Designer => "Produces the design token set",
            AgentRole::Coder => "Writes the content of one file at a time",
            AgentRole::Reviewer => "Audits the generated project and scores it",
            AgentRole::Patcher => "Repairs a file given a build error",
            AgentRole::Plugin => "Runs an installed plugin's prompt template",
        }
    }

    /// Whether the role answers with a JSON document rather than free text.
    pub fn returns_json(&self) -> bool {
        matches!(
            self,
            AgentRole::Planner | AgentRole::Designer | AgentRole::Reviewer | AgentRole::Plugin
        )
    }

    /// Status during which this role is called.
    pub fn status(&self) -> Option<AgentStatus> {
        match self {
            AgentRole::Manager => Some(AgentStatus::Managing),
            AgentRole::Planner => Some(AgentStatus::Planning),
            AgentRole::Designer => Some(AgentStatus::Designing),
            AgentRole::Coder => Some(AgentStatus::Coding),
            AgentRole::Reviewer => Some(AgentStatus::Reviewing),
            AgentRole::Patcher => Some(AgentStatus::Healing),
            AgentRole::Plugin => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            AgentRole::Manager,
            AgentRole::Planner,
            AgentRole::Designer,
            AgentRole::Coder,
            AgentRole::Reviewer,
            AgentRole::Patcher,
            AgentRole::Plugin,
        ]
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
