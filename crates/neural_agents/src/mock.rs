//! Deterministic stage client for tests and offline runs.
//!
//! Captures every call, returns canned stage outputs derived from the
//! inputs, and can be told to fail a given stage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use neural_core::{
    DesignSystem, FileSystem, NeuralPlugin, Plan, PluginResult, ReviewComment, ReviewReport,
    Severity,
};

use crate::client::StageClient;
use crate::error::{AgentError, AgentResult};
use crate::llm::{CompletionBackend, CompletionRequest};
use crate::roles::AgentRole;

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub role: AgentRole,
    /// Prompt, file path or plugin id, depending on the stage
    pub subject: String,
    /// File system as the stage saw it
    pub files: FileSystem,
}

/// Recording [`StageClient`] with canned outputs.
#[derive(Clone, Default)]
pub struct MockStageClient {
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    failures: Arc<RwLock<HashMap<AgentRole, String>>>,
    plugin_results: Arc<RwLock<HashMap<String, PluginResult>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockStageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call for `role` fail with `message`.
    pub fn fail_stage(self, role: AgentRole, message: impl Into<String>) -> Self {
        self.failures.write().insert(role, message.into());
        self
    }

    /// Result returned when the plugin with `id` runs.
    pub fn with_plugin_result(self, id: impl Into<String>, result: PluginResult) -> Self {
        self.plugin_results.write().insert(id.into(), result);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = Some(delay);
        self
    }

    /// Stop failing `role`.
    pub fn clear_failure(&self, role: AgentRole) {
        self.failures.write().remove(&role);
    }

    /// Get all captured calls.
    pub fn captured_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Calls made for one role.
    pub fn calls_for(&self, role: AgentRole) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.role == role)
            .cloned()
            .collect()
    }

    /// Number of times the plugin with `id` ran.
    pub fn plugin_call_count(&self, id: &str) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.role == AgentRole::Plugin && c.subject == id)
            .count()
    }

    /// Clear captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    async fn record(&self, role: AgentRole, subject: &str, files: &FileSystem) -> AgentResult<()> {
        debug!(%role, subject, "mock stage call");
        self.captured_calls.write().push(CapturedCall {
            role,
            subject: subject.to_string(),
            files: files.clone(),
        });

        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.read().get(&role).cloned();
        match failure {
            Some(message) => Err(AgentError::execution_failed(role.as_str(), message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StageClient for MockStageClient {
    async fn manage(&self, prompt: &str) -> AgentResult<String> {
        self.record(AgentRole::Manager, prompt, &FileSystem::new())
            .await?;
        Ok(format!(
            "# Requirements: {}\n\n1. Show the main list on load\n2. Add, edit and remove entries\n3. Persist nothing; use mock data only\n",
            prompt.trim()
        ))
    }

    async fn plan(&self, srs: &str) -> AgentResult<Plan> {
        self.record(AgentRole::Planner, srs, &FileSystem::new())
            .await?;
        Ok(Plan {
            features: vec![
                "List view".to_string(),
                "Create and edit entries".to_string(),
                "Header with app name".to_string(),
            ],
            files: vec![
                "index.html".to_string(),
                "src/App.tsx".to_string(),
                "src/components/Header.tsx".to_string(),
                "src/lib/mockData.ts".to_string(),
            ],
            dependencies: vec!["react".to_string(), "react-dom".to_string()],
        }
        .normalize())
    }

    async fn design(&self, prompt: &str, features: &[String]) -> AgentResult<DesignSystem> {
        self.record(AgentRole::Designer, prompt, &FileSystem::new())
            .await?;
        let mut design = DesignSystem::fallback(prompt);
        design.metadata.tagline = format!("{} features, zero setup", features.len());
        Ok(design)
    }

    async fn code(
        &self,
        file: &str,
        _plan: &Plan,
        design: &DesignSystem,
        files: &FileSystem,
    ) -> AgentResult<String> {
        self.record(AgentRole::Coder, file, files).await?;
        let name = &design.metadata.app_name;
        let content = match file.rsplit('.').next() {
            Some("html") => format!(
                "<!doctype html>\n<html><head><title>{}</title></head><body><div id=\"root\"></div></body></html>\n",
                name
            ),
            Some("ts") => "export const items = [\n  { id: 1, title: 'First item', done: false },\n];\n".to_string(),
            _ => format!(
                "export default function Component() {{\n  return <div style={{{{ color: '{}' }}}}>{}</div>;\n}}\n",
                design.colors.primary, name
            ),
        };
        Ok(content)
    }

    async fn review(&self, files: &FileSystem, _design: &DesignSystem) -> AgentResult<ReviewReport> {
        self.record(AgentRole::Reviewer, "project", files).await?;
        let mut report = ReviewReport {
            overall_score: 88.0,
            ..Default::default()
        };
        report.scores.insert("security".to_string(), 90.0);
        report.scores.insert("accessibility".to_string(), 84.0);
        report.comments.push(ReviewComment {
            file: "src/App.tsx".to_string(),
            severity: Severity::Low,
            category: "maintainability".to_string(),
            message: "Inline styles could move to design tokens".to_string(),
            recommendation: "Use CSS variables generated from the design system".to_string(),
        });
        Ok(report)
    }

    async fn patch(&self, file: &str, content: &str, error: &str) -> AgentResult<String> {
        self.record(AgentRole::Patcher, file, &FileSystem::new())
            .await?;
        Ok(format!("{}\n// patched: {}\n", content.trim_end(), error))
    }

    async fn run_plugin(
        &self,
        plugin: &NeuralPlugin,
        files: &FileSystem,
        _design: Option<&DesignSystem>,
    ) -> AgentResult<PluginResult> {
        self.record(AgentRole::Plugin, &plugin.id, files).await?;
        Ok(self
            .plugin_results
            .read()
            .get(&plugin.id)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// [`CompletionBackend`] answering with fixed raw text per role.
///
/// Lets the real parsing path run without a network.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    responses: Arc<RwLock<HashMap<AgentRole, String>>>,
    default_response: Arc<RwLock<String>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw text returned for `role`.
    pub fn respond(self, role: AgentRole, raw: impl Into<String>) -> Self {
        self.responses.write().insert(role, raw.into());
        self
    }

    /// Raw text for roles without a scripted response.
    pub fn otherwise(self, raw: impl Into<String>) -> Self {
        *self.default_response.write() = raw.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> AgentResult<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let scripted = self.responses.read().get(&request.role).cloned();
        Ok(scripted.unwrap_or_else(|| self.default_response.read().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neural_core::{PluginHook, REQUIRED_FILES};

    #[tokio::test]
    async fn test_mock_plan_has_required_files() {
        let client = MockStageClient::new();
        let plan = client.plan("srs").await.unwrap();
        for required in REQUIRED_FILES {
            assert!(plan.files.iter().any(|f| f == required));
        }
        assert_eq!(client.calls_for(AgentRole::Planner).len(), 1);
    }

    #[tokio::test]
    async fn test_fail_stage() {
        let client = MockStageClient::new().fail_stage(AgentRole::Designer, "quota exceeded");
        let err = client.design("todo", &[]).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));

        client.clear_failure(AgentRole::Designer);
        assert!(client.design("todo", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_plugin_results_and_counts() {
        let plugin = NeuralPlugin::new("p", "P", "d", PluginHook::PostCoding);
        let client = MockStageClient::new().with_plugin_result(
            "p",
            PluginResult {
                comments: vec![ReviewComment::default()],
                mutations: vec![],
            },
        );

        let result = client
            .run_plugin(&plugin, &FileSystem::new(), None)
            .await
            .unwrap();
        assert_eq!(result.comments.len(), 1);
        assert_eq!(client.plugin_call_count("p"), 1);
        assert_eq!(client.plugin_call_count("other"), 0);
    }

    #[tokio::test]
    async fn test_review_records_files_seen() {
        let client = MockStageClient::new();
        let mut files = FileSystem::new();
        files.insert("src/App.tsx".to_string(), "x".to_string());
        client.review(&files, &DesignSystem::default()).await.unwrap();
        assert_eq!(client.calls_for(AgentRole::Reviewer)[0].files, files);
    }

    #[tokio::test]
    async fn test_scripted_backend() {
        let backend = ScriptedBackend::new()
            .respond(AgentRole::Planner, "{}")
            .otherwise("text");
        let plan = CompletionRequest::new(AgentRole::Planner, "", "");
        let code = CompletionRequest::new(AgentRole::Coder, "", "");
        assert_eq!(backend.complete(&plan).await.unwrap(), "{}");
        assert_eq!(backend.complete(&code).await.unwrap(), "text");
        assert_eq!(backend.call_count(), 2);
    }
}
