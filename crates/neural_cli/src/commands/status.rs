//! Status command - Summarize the session.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use neural_core::{AgentStatus, ProjectState};

use super::open_local;

#[derive(Args)]
pub struct StatusArgs {
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Machine-readable view of the session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusSummary {
    status: AgentStatus,
    prompt: String,
    app_name: Option<String>,
    current_file: Option<String>,
    file_count: usize,
    vfs_bytes: usize,
    iteration_count: u32,
    review_score: Option<f64>,
    snapshot_count: usize,
    selected_snapshot: Option<String>,
    enabled_plugins: Vec<String>,
}

impl StatusSummary {
    fn from_state(state: &ProjectState) -> Self {
        Self {
            status: state.status,
            prompt: state.user_prompt.clone(),
            app_name: state
                .active_design_system()
                .map(|d| d.metadata.app_name.clone()),
            current_file: state.current_file.clone(),
            file_count: state.active_file_system().len(),
            vfs_bytes: state.vfs_bytes(),
            iteration_count: state.iteration_count,
            review_score: state.active_review_report().map(|r| r.overall_score),
            snapshot_count: state.history.len(),
            selected_snapshot: state.selected_snapshot().map(|s| s.label.clone()),
            enabled_plugins: state
                .installed_plugins
                .iter()
                .filter(|p| p.enabled)
                .map(|p| p.id.clone())
                .collect(),
        }
    }
}

pub async fn execute(args: StatusArgs, workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    let summary = studio.store().read(StatusSummary::from_state);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let icon = match summary.status {
        AgentStatus::Idle => "💤",
        AgentStatus::Ready => "✅",
        AgentStatus::Error => "❌",
        _ => "⏳",
    };
    println!("{} Status: {}", icon, summary.status);
    if summary.prompt.is_empty() {
        println!("   No run yet. Try: neural run \"a todo app\" --offline");
        return Ok(());
    }

    println!("   Prompt: {}", summary.prompt);
    if let Some(name) = &summary.app_name {
        println!("   App: {}", name);
    }
    println!(
        "   Files: {} ({} bytes)",
        summary.file_count, summary.vfs_bytes
    );
    if let Some(file) = &summary.current_file {
        println!("   Current file: {}", file);
    }
    if let Some(score) = summary.review_score {
        println!("   Review score: {:.0}/100", score);
    }
    if summary.iteration_count > 0 {
        println!("   Self-healing patches: {}", summary.iteration_count);
    }
    println!("   Snapshots: {}", summary.snapshot_count);
    if let Some(label) = &summary.selected_snapshot {
        println!("   👁  Viewing snapshot \"{}\" (read-only)", label);
    }
    println!("   Plugins enabled: {}", summary.enabled_plugins.join(", "));

    Ok(())
}
