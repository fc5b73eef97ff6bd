//! The stage contract.
//!
//! One method per pipeline stage plus plugin invocation. Inputs are plain
//! values; outputs are already normalized, so the orchestrator never sees
//! raw model text.

use async_trait::async_trait;

use neural_core::{DesignSystem, FileSystem, NeuralPlugin, Plan, PluginResult, ReviewReport};

use crate::error::AgentResult;

/// Calls made by the orchestrator, one per stage.
#[async_trait]
pub trait StageClient: Send + Sync {
    /// Requirements document for a user prompt.
    async fn manage(&self, prompt: &str) -> AgentResult<String>;

    /// Features, files and dependencies for the requirements.
    async fn plan(&self, srs: &str) -> AgentResult<Plan>;

    /// Design tokens for the prompt and planned features.
    async fn design(&self, prompt: &str, features: &[String]) -> AgentResult<DesignSystem>;

    /// Full content of one file. An empty string keeps the current content.
    async fn code(
        &self,
        file: &str,
        plan: &Plan,
        design: &DesignSystem,
        files: &FileSystem,
    ) -> AgentResult<String>;

    /// Audit of the whole project.
    async fn review(&self, files: &FileSystem, design: &DesignSystem) -> AgentResult<ReviewReport>;

    /// Replacement content for a file that failed to build.
    async fn patch(&self, file: &str, content: &str, error: &str) -> AgentResult<String>;

    /// Run a plugin's task against the project.
    async fn run_plugin(
        &self,
        plugin: &NeuralPlugin,
        files: &FileSystem,
        design: Option<&DesignSystem>,
    ) -> AgentResult<PluginResult>;

    /// Short name for logs.
    fn name(&self) -> &str;

    /// Drain notices about degraded answers (fallbacks substituted for
    /// malformed output) produced since the last call.
    fn take_warnings(&self) -> Vec<String> {
        Vec::new()
    }
}
