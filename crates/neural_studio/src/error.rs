//! Error types for the studio service.

use thiserror::Error;

use neural_agents::AgentError;
use neural_core::CoreError;

/// Result type alias for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;

/// Errors raised by the store, the orchestrator and persistence.
#[derive(Error, Debug)]
pub enum StudioError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Stale result from generation {actual} discarded (current generation {expected})")]
    StaleGeneration { expected: u64, actual: u64 },

    #[error("Orchestrator stopped")]
    OrchestratorStopped,
}

impl StudioError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether this error only means a result arrived too late.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleGeneration { .. })
    }
}
