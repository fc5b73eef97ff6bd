//! Prompt templates for every stage.
//!
//! System prompts are fixed per role; user prompts are rendered from the
//! stage inputs. JSON roles are told the exact shape they must return.

use neural_core::{DesignSystem, FileSystem, NeuralPlugin, Plan, REQUIRED_FILES};

use crate::roles::AgentRole;

/// Largest file excerpt embedded in review and plugin prompts.
const MAX_EXCERPT_CHARS: usize = 6000;

/// Get the system prompt for a role.
pub fn system_prompt(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Manager => MANAGER_SYSTEM_PROMPT,
        AgentRole::Planner => PLANNER_SYSTEM_PROMPT,
        AgentRole::Designer => DESIGNER_SYSTEM_PROMPT,
        AgentRole::Coder => CODER_SYSTEM_PROMPT,
        AgentRole::Reviewer => REVIEWER_SYSTEM_PROMPT,
        AgentRole::Patcher => PATCHER_SYSTEM_PROMPT,
        AgentRole::Plugin => PLUGIN_SYSTEM_PROMPT,
    }
}

pub fn manager_prompt(prompt: &str) -> String {
    format!(
        "Write the software requirements specification for this request:\n\n{}",
        prompt.trim()
    )
}

pub fn planner_prompt(srs: &str) -> String {
    format!(
        "Requirements:\n{}\n\nThe file list MUST include {}.",
        srs.trim(),
        REQUIRED_FILES.join(" and ")
    )
}

pub fn designer_prompt(prompt: &str, features: &[String]) -> String {
    let features = if features.is_empty() {
        "- (none listed)".to_string()
    } else {
        features
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("Product request: {}\n\nFeatures:\n{}", prompt.trim(), features)
}

pub fn coder_prompt(file: &str, plan: &Plan, design: &DesignSystem, files: &FileSystem) -> String {
    let paths = files.keys().cloned().collect::<Vec<_>>().join("\n");
    let mut out = format!(
        "Write the complete content of `{}`.\n\nProject files:\n{}\n\nFeatures:\n{}\n\nDependencies: {}\n\nDesign system:\n{}",
        file,
        paths,
        plan.features.join("\n"),
        plan.dependencies.join(", "),
        to_json(design),
    );

    if file != "src/lib/mockData.ts" {
        if let Some(mock) = files.get("src/lib/mockData.ts") {
            out.push_str("\n\nCurrent src/lib/mockData.ts:\n");
            out.push_str(excerpt(mock));
        }
    }
    out
}

pub fn reviewer_prompt(files: &FileSystem, design: &DesignSystem) -> String {
    format!(
        "Design system:\n{}\n\nProject:\n{}",
        to_json(design),
        render_files(files)
    )
}

pub fn patcher_prompt(file: &str, content: &str, error: &str) -> String {
    format!(
        "The build failed with:\n{}\n\nFix `{}`. Current content:\n{}",
        error.trim(),
        file,
        content
    )
}

pub fn plugin_prompt(
    plugin: &NeuralPlugin,
    files: &FileSystem,
    design: Option<&DesignSystem>,
) -> String {
    let design = design.map(to_json).unwrap_or_else(|| "(none)".to_string());
    format!(
        "Plugin: {} ({})\nTask: {}\n\nDesign system:\n{}\n\nProject:\n{}",
        plugin.name,
        plugin.id,
        plugin.description,
        design,
        render_files(files)
    )
}

fn render_files(files: &FileSystem) -> String {
    files
        .iter()
        .map(|(path, content)| format!("--- {} ---\n{}", path, excerpt(content)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn excerpt(content: &str) -> &str {
    match content.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

const MANAGER_SYSTEM_PROMPT: &str = r#"You are the Manager agent of NeuralStudio, an AI application studio.

Turn the user's request into a concise software requirements specification:
1. Purpose and target users
2. Functional requirements as a numbered list
3. Non-functional requirements (responsiveness, accessibility)
4. Explicit out-of-scope items

The app is a single-page React + TypeScript project backed by mock data only.
Answer in plain Markdown."#;

const PLANNER_SYSTEM_PROMPT: &str = r#"You are the Planner agent of NeuralStudio.

Break the requirements into a build plan. Respond with JSON only:
{
  "features": ["short feature description", ...],
  "files": ["relative/path.tsx", ...],
  "dependencies": ["npm-package", ...]
}

Keep the project small: at most 8 files. Paths are relative, without a leading slash."#;

const DESIGNER_SYSTEM_PROMPT: &str = r##"You are the Designer agent of NeuralStudio.

Produce a design system for the app. Respond with JSON only:
{
  "colors": {"primary": "#hex", "secondary": "#hex", "accent": "#hex", "background": "#hex", "surface": "#hex", "text": "#hex"},
  "layout": {"borderRadius": "css length", "spacing": "css length", "containerWidth": "css length"},
  "typography": {"fontFamily": "css font stack", "headingFont": "css font stack", "baseSize": "css length"},
  "metadata": {"appName": "Display Name", "tagline": "one line", "style": "one word"}
}"##;

const CODER_SYSTEM_PROMPT: &str = r#"You are the Coder agent of NeuralStudio.

Write one file of a React + TypeScript project at a time.
- Honor the design system tokens exactly
- Import data only from src/lib/mockData.ts
- Never call real network APIs

Return only the file content, no explanations and no Markdown fences."#;

const REVIEWER_SYSTEM_PROMPT: &str = r#"You are the Reviewer agent of NeuralStudio.

Audit the generated project for correctness, security, accessibility and
adherence to the design system. Respond with JSON only:
{
  "overallScore": 0-100,
  "scores": {"security": 0-100, "accessibility": 0-100, "performance": 0-100, "maintainability": 0-100},
  "comments": [
    {"file": "path", "severity": "info|low|medium|high|critical", "category": "...", "message": "...", "recommendation": "..."}
  ]
}"#;

const PATCHER_SYSTEM_PROMPT: &str = r#"You are the Patcher agent of NeuralStudio.

You receive one file and a build error. Return the corrected full content of
the file, no explanations and no Markdown fences."#;

const PLUGIN_SYSTEM_PROMPT: &str = r#"You are a NeuralStudio plugin.

Perform the task described below on the project. Respond with JSON only:
{
  "comments": [
    {"file": "path", "severity": "info|low|medium|high|critical", "category": "...", "message": "...", "recommendation": "..."}
  ],
  "mutations": [
    {"path": "path", "content": "full new file content"}
  ]
}

Only include a mutation when the file must change. Either list may be empty."#;
