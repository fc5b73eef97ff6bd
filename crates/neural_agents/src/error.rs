//! Error types for stage agents.

use thiserror::Error;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors raised while calling a stage agent.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    LlmNotConfigured,

    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Malformed {stage} response: {message}")]
    MalformedResponse { stage: String, message: String },

    #[error("Agent {agent} failed: {message}")]
    ExecutionFailed { agent: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Create a malformed response error.
    pub fn malformed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create an execution failed error.
    pub fn execution_failed(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            agent: agent.into(),
            message: message.into(),
        }
    }
}
