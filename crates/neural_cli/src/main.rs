//! NeuralStudio CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Pipeline halted
//! - 4: Configuration error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use neural_agents::AgentError;
use neural_core::CoreError;
use neural_studio::StudioError;

mod commands;

use commands::{Cli, Commands, PipelineHalted};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const PIPELINE_HALTED: u8 = 3;
    pub const CONFIG_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let workspace = cli.workspace.clone();
    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &workspace).await,
        Commands::Status(args) => commands::status::execute(args, &workspace).await,
        Commands::Files(args) => commands::files::execute(args, &workspace).await,
        Commands::Edit(args) => commands::files::edit(args, &workspace).await,
        Commands::Logs(args) => commands::logs::execute(args, &workspace).await,
        Commands::History(args) => commands::history::list(args, &workspace).await,
        Commands::Select(args) => commands::history::select(args, &workspace).await,
        Commands::Rollback(args) => commands::history::rollback(args, &workspace).await,
        Commands::Plugins(args) => commands::plugins::execute(args, &workspace).await,
        Commands::Theme(args) => commands::theme::execute(args, &workspace).await,
        Commands::Save => commands::project::save(&workspace).await,
        Commands::Reset(args) => commands::project::reset(args, &workspace).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Install the tracing subscriber; logs go to stderr so stdout stays scriptable.
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("neural={},warn", level)));

    let log_result = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<PipelineHalted>().is_some() {
        return ExitCodes::PIPELINE_HALTED;
    }

    if let Some(studio) = e.downcast_ref::<StudioError>() {
        return match studio {
            StudioError::Config(_) | StudioError::Toml(_) | StudioError::Yaml(_) => {
                ExitCodes::CONFIG_ERROR
            }
            StudioError::Agent(agent) => categorize_agent_error(agent),
            StudioError::Core(core) => categorize_core_error(core),
            _ => ExitCodes::GENERAL_ERROR,
        };
    }
    if let Some(agent) = e.downcast_ref::<AgentError>() {
        return categorize_agent_error(agent);
    }
    if let Some(core) = e.downcast_ref::<CoreError>() {
        return categorize_core_error(core);
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

fn categorize_agent_error(e: &AgentError) -> u8 {
    match e {
        AgentError::LlmNotConfigured | AgentError::UnknownProvider(_) => ExitCodes::CONFIG_ERROR,
        _ => ExitCodes::GENERAL_ERROR,
    }
}

fn categorize_core_error(e: &CoreError) -> u8 {
    match e {
        CoreError::SnapshotNotFound(_)
        | CoreError::PluginNotFound(_)
        | CoreError::PluginDisabled(_)
        | CoreError::FileNotFound(_)
        | CoreError::UnknownToken(_)
        | CoreError::EmptyPrompt => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let halted = anyhow::Error::new(PipelineHalted("boom".to_string()));
        assert_eq!(categorize_error(&halted), ExitCodes::PIPELINE_HALTED);

        let config = anyhow::Error::new(StudioError::config("bad"));
        assert_eq!(categorize_error(&config), ExitCodes::CONFIG_ERROR);

        let missing = anyhow::Error::new(StudioError::Core(CoreError::SnapshotNotFound(
            "x".to_string(),
        )));
        assert_eq!(categorize_error(&missing), ExitCodes::INVALID_ARGS);

        let no_key = anyhow::Error::new(AgentError::LlmNotConfigured);
        assert_eq!(categorize_error(&no_key), ExitCodes::CONFIG_ERROR);

        let other = anyhow::anyhow!("disk full");
        assert_eq!(categorize_error(&other), ExitCodes::GENERAL_ERROR);
    }

    #[test]
    fn test_context_keeps_exit_code() {
        let err = anyhow::Error::new(StudioError::config("bad")).context("Loading neural.toml");
        assert_eq!(categorize_error(&err), ExitCodes::CONFIG_ERROR);
    }
}
