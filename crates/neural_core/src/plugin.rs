//! Plugin registry types.
//!
//! A plugin is an extra prompt template bound to a lifecycle hook. Its
//! result can rewrite files and/or add review comments; how the result is
//! merged into project state lives in [`crate::state::ProjectState::apply_plugin_result`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::ReviewComment;

/// Pipeline point a plugin is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginHook {
    /// Runs after every file has been generated
    PostCoding,
    /// Runs after the reviewer produced its report
    PostAudit,
    /// Runs only when triggered by the user
    OnDemand,
}

impl PluginHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostCoding => "post-coding",
            Self::PostAudit => "post-audit",
            Self::OnDemand => "on-demand",
        }
    }
}

impl fmt::Display for PluginHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An installed extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralPlugin {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub hook: PluginHook,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub author: String,
}

impl NeuralPlugin {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        hook: PluginHook,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            icon: String::new(),
            hook,
            enabled: false,
            author: String::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the plugin should run automatically at `hook`.
    pub fn runs_at(&self, hook: PluginHook) -> bool {
        self.enabled && self.hook == hook && hook != PluginHook::OnDemand
    }
}

/// A full-content rewrite of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMutation {
    pub path: String,
    pub content: String,
}

/// What a plugin invocation returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginResult {
    pub comments: Vec<ReviewComment>,
    pub mutations: Vec<FileMutation>,
}

impl PluginResult {
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty() && self.mutations.is_empty()
    }
}

/// Built-in plugin registry for a fresh project.
pub fn default_plugins() -> Vec<NeuralPlugin> {
    vec![
        NeuralPlugin::new(
            "security-auditor",
            "Security Auditor",
            "Scans generated code for injection risks, unsafe HTML and leaked secrets.",
            PluginHook::PostAudit,
        )
        .with_icon("shield")
        .with_author("NeuralStudio")
        .enabled(true),
        NeuralPlugin::new(
            "a11y-checker",
            "Accessibility Checker",
            "Flags missing labels, poor contrast against the design tokens and keyboard traps.",
            PluginHook::PostAudit,
        )
        .with_icon("eye")
        .with_author("NeuralStudio"),
        NeuralPlugin::new(
            "perf-optimizer",
            "Performance Optimizer",
            "Rewrites components to memoize expensive renders and trim bundle weight.",
            PluginHook::PostCoding,
        )
        .with_icon("zap")
        .with_author("NeuralStudio"),
        NeuralPlugin::new(
            "doc-generator",
            "Documentation Generator",
            "Writes a README describing features, structure and how to run the app.",
            PluginHook::OnDemand,
        )
        .with_icon("book")
        .with_author("NeuralStudio")
        .enabled(true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_serde() {
        let json = serde_json::to_string(&PluginHook::PostCoding).unwrap();
        assert_eq!(json, "\"post-coding\"");
        let hook: PluginHook = serde_json::from_str("\"on-demand\"").unwrap();
        assert_eq!(hook, PluginHook::OnDemand);
    }

    #[test]
    fn test_runs_at_requires_enabled_and_matching_hook() {
        let plugin = NeuralPlugin::new("p", "P", "d", PluginHook::PostAudit);
        assert!(!plugin.runs_at(PluginHook::PostAudit));

        let plugin = plugin.enabled(true);
        assert!(plugin.runs_at(PluginHook::PostAudit));
        assert!(!plugin.runs_at(PluginHook::PostCoding));
    }

    #[test]
    fn test_on_demand_never_runs_automatically() {
        let plugin = NeuralPlugin::new("p", "P", "d", PluginHook::OnDemand).enabled(true);
        assert!(!plugin.runs_at(PluginHook::OnDemand));
    }

    #[test]
    fn test_default_registry_ids_unique() {
        let plugins = default_plugins();
        let mut ids: Vec<_> = plugins.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), plugins.len());
    }
}
