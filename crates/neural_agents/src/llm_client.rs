//! [`StageClient`] backed by a chat completion API.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use neural_core::{DesignSystem, FileSystem, NeuralPlugin, Plan, PluginResult, ReviewReport};

use crate::client::StageClient;
use crate::error::{AgentError, AgentResult};
use crate::llm::{CompletionBackend, CompletionRequest, LlmAdapter, LlmSettings};
use crate::parse::{parse_structured, parse_text, ParsePolicy, Parsed};
use crate::prompts;
use crate::roles::AgentRole;

/// Renders prompts, calls the backend and normalizes the answers.
pub struct LlmStageClient {
    backend: Arc<dyn CompletionBackend>,
    policy: ParsePolicy,
    warnings: Mutex<Vec<String>>,
}

impl LlmStageClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, policy: ParsePolicy) -> Self {
        Self {
            backend,
            policy,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Build an HTTP-backed client from settings and environment keys.
    pub fn from_env(settings: &LlmSettings, policy: ParsePolicy) -> AgentResult<Self> {
        let adapter = LlmAdapter::from_env(settings)?;
        info!(provider = ?adapter.provider(), model = adapter.model(), %policy, "LLM stage client ready");
        Ok(Self::new(Arc::new(adapter), policy))
    }

    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }

    async fn ask(&self, role: AgentRole, user: String) -> AgentResult<String> {
        let request = CompletionRequest::new(role, prompts::system_prompt(role), user);
        debug!(%role, chars = request.user.len(), "Sending stage prompt");
        self.backend.complete(&request).await
    }

    /// Unwrap `parsed`, remembering when the value is a fallback.
    fn accept<T>(&self, role: AgentRole, parsed: Parsed<T>) -> T {
        if parsed.degraded {
            self.warnings
                .lock()
                .push(format!("{} response malformed, using fallback", role));
        }
        parsed.value
    }
}

#[async_trait]
impl StageClient for LlmStageClient {
    async fn manage(&self, prompt: &str) -> AgentResult<String> {
        let raw = self
            .ask(AgentRole::Manager, prompts::manager_prompt(prompt))
            .await?;
        Ok(self.accept(AgentRole::Manager, parse_text(&raw)))
    }

    async fn plan(&self, srs: &str) -> AgentResult<Plan> {
        let raw = self
            .ask(AgentRole::Planner, prompts::planner_prompt(srs))
            .await?;
        let parsed = parse_structured(AgentRole::Planner, &raw, self.policy, Plan::fallback)?;
        Ok(self.accept(AgentRole::Planner, parsed).normalize())
    }

    async fn design(&self, prompt: &str, features: &[String]) -> AgentResult<DesignSystem> {
        let raw = self
            .ask(AgentRole::Designer, prompts::designer_prompt(prompt, features))
            .await?;
        let parsed = parse_structured(AgentRole::Designer, &raw, self.policy, || {
            DesignSystem::fallback(prompt)
        })?;
        Ok(self.accept(AgentRole::Designer, parsed).normalize(prompt))
    }

    async fn code(
        &self,
        file: &str,
        plan: &Plan,
        design: &DesignSystem,
        files: &FileSystem,
    ) -> AgentResult<String> {
        let raw = self
            .ask(AgentRole::Coder, prompts::coder_prompt(file, plan, design, files))
            .await?;
        // An empty file keeps its placeholder; the orchestrator logs that itself
        let parsed = parse_text(&raw);
        if parsed.degraded {
            warn!(file, "Coder returned no content, keeping previous content");
        }
        Ok(parsed.value)
    }

    async fn review(&self, files: &FileSystem, design: &DesignSystem) -> AgentResult<ReviewReport> {
        let raw = self
            .ask(AgentRole::Reviewer, prompts::reviewer_prompt(files, design))
            .await?;
        let parsed =
            parse_structured(AgentRole::Reviewer, &raw, self.policy, ReviewReport::fallback)?;
        Ok(self.accept(AgentRole::Reviewer, parsed).normalize())
    }

    async fn patch(&self, file: &str, content: &str, error: &str) -> AgentResult<String> {
        let raw = self
            .ask(AgentRole::Patcher, prompts::patcher_prompt(file, content, error))
            .await?;
        let parsed = parse_text(&raw);
        if parsed.degraded {
            return Err(AgentError::execution_failed(
                AgentRole::Patcher.as_str(),
                format!("no replacement content for {}", file),
            ));
        }
        Ok(parsed.value)
    }

    async fn run_plugin(
        &self,
        plugin: &NeuralPlugin,
        files: &FileSystem,
        design: Option<&DesignSystem>,
    ) -> AgentResult<PluginResult> {
        let raw = self
            .ask(AgentRole::Plugin, prompts::plugin_prompt(plugin, files, design))
            .await?;
        let parsed = parse_structured(AgentRole::Plugin, &raw, self.policy, PluginResult::default)?;
        Ok(self.accept(AgentRole::Plugin, parsed))
    }

    fn name(&self) -> &str {
        "llm"
    }

    fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock())
    }
}
