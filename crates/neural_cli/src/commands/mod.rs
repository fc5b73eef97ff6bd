//! CLI command definitions.
//!
//! Each subcommand opens the studio for one workspace directory, applies a
//! single command to the persisted project state and exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use thiserror::Error;

use neural_agents::{LlmStageClient, MockStageClient, StageClient};
use neural_core::{HistorySnapshot, ProjectState};
use neural_studio::{Studio, StudioConfig};

pub mod files;
pub mod history;
pub mod logs;
pub mod plugins;
pub mod project;
pub mod run;
pub mod status;
pub mod theme;

/// NeuralStudio - autonomous multi-agent app generator
#[derive(Parser)]
#[command(name = "neural")]
#[command(version, about = "NeuralStudio - autonomous multi-agent app generator")]
#[command(long_about = r#"
NeuralStudio turns a one-line app idea into a small React/TypeScript
project by running a pipeline of AI agents over a virtual file system.

PIPELINE:
  managing → planning → designing → architecting → coding
  → reviewing → compiling (→ healing → compiling) → ready

COMMANDS:
  run        → Run the pipeline for a prompt
  status     → Show the current stage, design and review
  files      → List or print generated files
  history    → List snapshots; select or rollback to inspect/restore them
  plugins    → List, toggle or manually run plugins
  theme      → Show or edit design tokens

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Pipeline halted
  4 - Configuration error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Workspace directory holding neural.toml and the saved session
    #[arg(short, long, global = true, default_value = ".", env = "NEURAL_WORKSPACE")]
    pub workspace: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the generation pipeline for a prompt
    Run(run::RunArgs),

    /// Show the session status
    Status(status::StatusArgs),

    /// List files, or print one
    Files(files::FilesArgs),

    /// Replace the content of a generated file
    Edit(files::EditArgs),

    /// Print the terminal log
    Logs(logs::LogsArgs),

    /// List history snapshots
    History(history::HistoryArgs),

    /// Inspect a snapshot read-only (or return to live state)
    Select(history::SelectArgs),

    /// Restore the live state from a snapshot
    Rollback(history::RollbackArgs),

    /// Manage plugins
    Plugins(plugins::PluginsArgs),

    /// Show or edit design tokens
    Theme(theme::ThemeArgs),

    /// Save the session now
    Save,

    /// Discard the session and start over
    Reset(project::ResetArgs),
}

/// The pipeline stopped in the `error` status.
#[derive(Debug, Error)]
#[error("Pipeline halted: {0}")]
pub struct PipelineHalted(pub String);

/// Load `neural.toml` plus environment overrides.
pub fn load_config(workspace: &Path) -> Result<StudioConfig> {
    StudioConfig::load(workspace)
        .with_context(|| format!("Loading configuration from {}", workspace.display()))
}

/// Open the studio on `workspace` with the real LLM client, or the offline
/// mock when `offline` is set.
pub fn open_studio(workspace: &Path, config: StudioConfig, offline: bool) -> Result<Studio> {
    let client: Arc<dyn StageClient> = if offline {
        Arc::new(MockStageClient::new())
    } else {
        let key_var = config.llm.provider.key_var();
        Arc::new(
            LlmStageClient::from_env(&config.llm, config.parsing.policy).with_context(|| {
                format!("Set {} or pass --offline to use the built-in mock agents", key_var)
            })?,
        )
    };
    Ok(Studio::open(workspace, config, client)?)
}

/// Open the studio for commands that never call an agent.
pub fn open_local(workspace: &Path) -> Result<Studio> {
    let config = load_config(workspace)?;
    open_studio(workspace, config, true)
}

/// Find a snapshot by 1-based index or id prefix.
pub fn resolve_snapshot<'a>(state: &'a ProjectState, token: &str) -> Result<&'a HistorySnapshot> {
    if let Ok(index) = token.parse::<usize>() {
        if index >= 1 && index <= state.history.len() {
            return Ok(&state.history[index - 1]);
        }
    }

    let matches: Vec<_> = state
        .history
        .iter()
        .filter(|s| s.id.starts_with(token))
        .collect();
    match matches.as_slice() {
        [one] => Ok(one),
        [] => Err(neural_core::CoreError::SnapshotNotFound(token.to_string()).into()),
        _ => anyhow::bail!("Snapshot id prefix is ambiguous: {}", token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["neural", "run", "todo app", "--offline"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.prompt, "todo app");
                assert!(args.offline);
                assert!(!args.force_failure);
            }
            _ => panic!("expected run"),
        }
        assert_eq!(cli.workspace, PathBuf::from("."));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["neural", "status", "-w", "/tmp/ws", "--json-logs"]).unwrap();
        assert_eq!(cli.workspace, PathBuf::from("/tmp/ws"));
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_parse_plugin_toggle() {
        let cli = Cli::try_parse_from(["neural", "plugins", "toggle", "a11y-checker"]).unwrap();
        assert!(matches!(cli.command, Commands::Plugins(_)));
    }

    #[test]
    fn test_run_requires_prompt() {
        assert!(Cli::try_parse_from(["neural", "run"]).is_err());
    }

    #[test]
    fn test_resolve_snapshot_by_index_and_prefix() {
        let mut state = ProjectState::new();
        state.start_run("todo app").unwrap();
        state.capture_snapshot("Extra");
        let second = state.history[1].id.clone();

        assert_eq!(resolve_snapshot(&state, "1").unwrap().id, state.history[0].id);
        assert_eq!(resolve_snapshot(&state, &second[..8]).unwrap().id, second);
        assert!(resolve_snapshot(&state, "zzzz").is_err());
    }
}
