//! Structured stage outputs: plan, design system and review report.
//!
//! Every type here deserializes leniently (`#[serde(default)]`) so that a
//! partially valid LLM response still yields a usable value, and carries an
//! explicit fallback for the case where nothing usable came back.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// The virtual project: path -> file content.
///
/// Ordered so that per-file stages iterate deterministically.
pub type FileSystem = BTreeMap<String, String>;

/// Files every generated project must contain.
pub const REQUIRED_FILES: [&str; 2] = ["src/App.tsx", "src/lib/mockData.ts"];

/// Output of the planner stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    pub features: Vec<String>,
    /// Virtual paths of the files to generate
    pub files: Vec<String>,
    pub dependencies: Vec<String>,
}

impl Plan {
    /// Plan used when the planner returned nothing usable.
    pub fn fallback() -> Self {
        Self {
            features: vec!["Core application shell".to_string()],
            files: vec![
                "index.html".to_string(),
                "src/main.tsx".to_string(),
                "src/App.tsx".to_string(),
                "src/lib/mockData.ts".to_string(),
            ],
            dependencies: vec!["react".to_string(), "react-dom".to_string()],
        }
    }

    /// Trim and de-duplicate paths and make sure the required files exist.
    pub fn normalize(mut self) -> Self {
        let mut seen = BTreeSet::new();
        self.files = self
            .files
            .into_iter()
            .map(|f| f.trim().trim_start_matches("./").trim_start_matches('/').to_string())
            .filter(|f| !f.is_empty() && seen.insert(f.clone()))
            .collect();

        for required in REQUIRED_FILES {
            if !self.files.iter().any(|f| f == required) {
                self.files.push(required.to_string());
            }
        }

        self.features.retain(|f| !f.trim().is_empty());
        self.dependencies.retain(|d| !d.trim().is_empty());
        self
    }
}

/// Color tokens of the design system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorTokens {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub surface: String,
    pub text: String,
}

impl Default for ColorTokens {
    fn default() -> Self {
        Self {
            primary: "#6366f1".to_string(),
            secondary: "#0ea5e9".to_string(),
            accent: "#f59e0b".to_string(),
            background: "#0f172a".to_string(),
            surface: "#1e293b".to_string(),
            text: "#f8fafc".to_string(),
        }
    }
}

/// Layout tokens of the design system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutTokens {
    pub border_radius: String,
    pub spacing: String,
    pub container_width: String,
}

impl Default for LayoutTokens {
    fn default() -> Self {
        Self {
            border_radius: "0.75rem".to_string(),
            spacing: "1rem".to_string(),
            container_width: "72rem".to_string(),
        }
    }
}

/// Typography tokens of the design system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypographyTokens {
    pub font_family: String,
    pub heading_font: String,
    pub base_size: String,
}

impl Default for TypographyTokens {
    fn default() -> Self {
        Self {
            font_family: "Inter, sans-serif".to_string(),
            heading_font: "Inter, sans-serif".to_string(),
            base_size: "16px".to_string(),
        }
    }
}

/// Naming and branding metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignMetadata {
    pub app_name: String,
    pub tagline: String,
    pub style: String,
}

/// Structured token set produced by the designer stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSystem {
    pub colors: ColorTokens,
    pub layout: LayoutTokens,
    pub typography: TypographyTokens,
    pub metadata: DesignMetadata,
}

impl DesignSystem {
    /// Design system used when the designer returned nothing usable.
    pub fn fallback(prompt: &str) -> Self {
        let mut design = Self::default();
        design.metadata.app_name = app_name_from_prompt(prompt);
        design.metadata.style = "minimal".to_string();
        design
    }

    /// Fill in the app name from the prompt when the designer left it empty.
    pub fn normalize(mut self, prompt: &str) -> Self {
        if self.metadata.app_name.trim().is_empty() {
            self.metadata.app_name = app_name_from_prompt(prompt);
        }
        self
    }

    /// Read a token by dotted path, e.g. `colors.primary`.
    pub fn token(&self, path: &str) -> Option<String> {
        let value = serde_json::to_value(self).ok()?;
        value
            .pointer(&token_pointer(path))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Overwrite a token by dotted path, e.g. `colors.primary`.
    pub fn set_token(&mut self, path: &str, new_value: impl Into<String>) -> CoreResult<()> {
        let mut value =
            serde_json::to_value(&*self).map_err(|_| CoreError::UnknownToken(path.to_string()))?;

        match value.pointer_mut(&token_pointer(path)) {
            Some(slot) if slot.is_string() => {
                *slot = serde_json::Value::String(new_value.into());
            }
            _ => return Err(CoreError::UnknownToken(path.to_string())),
        }

        *self =
            serde_json::from_value(value).map_err(|_| CoreError::UnknownToken(path.to_string()))?;
        Ok(())
    }
}

fn token_pointer(path: &str) -> String {
    format!("/{}", path.trim().replace('.', "/"))
}

/// Derive a display name from a free-text prompt ("todo app" -> "Todo App").
pub fn app_name_from_prompt(prompt: &str) -> String {
    let name = prompt
        .split_whitespace()
        .take(4)
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        "Untitled App".to_string()
    } else {
        name
    }
}

/// Severity of a review comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "info" | "note" => Self::Info,
            "low" | "minor" => Self::Low,
            "high" | "major" | "error" => Self::High,
            "critical" | "blocker" => Self::Critical,
            _ => Self::Medium,
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding in a review report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewComment {
    pub file: String,
    pub severity: Severity,
    pub category: String,
    pub message: String,
    pub recommendation: String,
}

/// Result of an audit of the generated project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReviewReport {
    pub overall_score: f64,
    /// Per-category scores
    pub scores: BTreeMap<String, f64>,
    pub comments: Vec<ReviewComment>,
}

impl ReviewReport {
    /// Report used when the reviewer returned nothing usable.
    pub fn fallback() -> Self {
        Self::default()
    }

    /// Clamp every score into `[0, 100]`.
    pub fn normalize(mut self) -> Self {
        self.overall_score = clamp_score(self.overall_score);
        for score in self.scores.values_mut() {
            *score = clamp_score(*score);
        }
        self
    }

    /// Highest severity across all comments.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.comments.iter().map(|c| c.severity).max()
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_normalize_adds_required_files() {
        let plan = Plan {
            features: vec!["List".to_string(), " ".to_string()],
            files: vec!["./src/App.tsx".to_string(), "src/App.tsx".to_string(), "".to_string()],
            dependencies: vec![],
        }
        .normalize();

        assert_eq!(plan.files, vec!["src/App.tsx", "src/lib/mockData.ts"]);
        assert_eq!(plan.features, vec!["List"]);
    }

    #[test]
    fn test_plan_fallback_contains_required_files() {
        let plan = Plan::fallback().normalize();
        for required in REQUIRED_FILES {
            assert!(plan.files.iter().any(|f| f == required));
        }
    }

    #[test]
    fn test_partial_design_system_is_defaulted() {
        let design: DesignSystem =
            serde_json::from_str(r##"{"colors":{"primary":"#ff0000"}}"##).unwrap();
        assert_eq!(design.colors.primary, "#ff0000");
        assert_eq!(design.colors.secondary, ColorTokens::default().secondary);

        let design = design.normalize("todo app");
        assert_eq!(design.metadata.app_name, "Todo App");
    }

    #[test]
    fn test_set_token() {
        let mut design = DesignSystem::fallback("notes");
        design.set_token("colors.primary", "#123456").unwrap();
        assert_eq!(design.colors.primary, "#123456");
        assert_eq!(design.token("colors.primary").as_deref(), Some("#123456"));

        design.set_token("metadata.appName", "Renamed").unwrap();
        assert_eq!(design.metadata.app_name, "Renamed");
    }

    #[test]
    fn test_set_unknown_token_fails() {
        let mut design = DesignSystem::default();
        assert_eq!(
            design.set_token("colors.nope", "x"),
            Err(CoreError::UnknownToken("colors.nope".to_string()))
        );
        assert!(design.set_token("colors", "x").is_err());
    }

    #[test]
    fn test_review_scores_clamped() {
        let report: ReviewReport = serde_json::from_str(
            r#"{"overallScore": 140, "scores": {"security": -3}, "comments": [{"severity": "BLOCKER", "message": "x"}]}"#,
        )
        .unwrap();
        let report = report.normalize();
        assert_eq!(report.overall_score, 100.0);
        assert_eq!(report.scores["security"], 0.0);
        assert_eq!(report.worst_severity(), Some(Severity::Critical));
    }

    #[test]
    fn test_app_name_from_prompt() {
        assert_eq!(app_name_from_prompt("todo app"), "Todo App");
        assert_eq!(app_name_from_prompt("   "), "Untitled App");
    }
}
