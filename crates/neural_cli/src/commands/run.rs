//! Run command - Drive the pipeline for one prompt.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use neural_agents::ParsePolicy;
use neural_core::{AgentStatus, ProjectState};
use neural_studio::StateEvent;

use super::{load_config, open_studio, PipelineHalted};

#[derive(Args)]
pub struct RunArgs {
    /// What to build, e.g. "a todo app with due dates"
    pub prompt: String,

    /// Use the built-in mock agents instead of an LLM
    #[arg(long)]
    pub offline: bool,

    /// Make the first build fail so the self-healing loop runs
    #[arg(long)]
    pub force_failure: bool,

    /// How to treat malformed agent output (strict | lenient)
    #[arg(long)]
    pub parse_policy: Option<ParsePolicy>,

    /// Seed for the simulated build
    #[arg(long)]
    pub seed: Option<u64>,
}

pub async fn execute(args: RunArgs, workspace: &Path) -> Result<()> {
    let mut config = load_config(workspace)?;
    if args.force_failure {
        config.pipeline.failure_probability = 1.0;
    }
    if let Some(policy) = args.parse_policy {
        config.parsing.policy = policy;
    }
    if args.seed.is_some() {
        config.pipeline.seed = args.seed;
    }

    let mut studio = open_studio(workspace, config, args.offline)?;
    studio.start_resource_ticker();
    let mut events = studio.store().subscribe();

    info!("Starting run for prompt: {}", args.prompt);
    println!("🚀 Generating: {}", args.prompt);
    println!();

    let generation = studio.start_run(&args.prompt)?;
    let settled = studio.wait_until_settled(generation);
    tokio::pin!(settled);

    let status = loop {
        tokio::select! {
            status = &mut settled => break status?,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} state events", skipped),
                Err(RecvError::Closed) => break studio.store().status(),
            },
        }
    };
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }

    let state = studio.store().snapshot();
    println!();
    match status {
        AgentStatus::Ready => {
            print_summary(&state);
            Ok(())
        }
        AgentStatus::Error => {
            let reason = state
                .terminal_logs
                .iter()
                .rev()
                .find(|line| line.starts_with("[error]"))
                .cloned()
                .unwrap_or_else(|| "unknown failure".to_string());
            Err(PipelineHalted(reason).into())
        }
        other => {
            println!("⚠️  Run was superseded (status: {})", other);
            Ok(())
        }
    }
}

fn print_event(event: &StateEvent) {
    match event {
        StateEvent::LogAppended { line } => println!("   {}", line),
        StateEvent::SnapshotCaptured { label, .. } => println!("   📸 {}", label),
        _ => {}
    }
}

fn print_summary(state: &ProjectState) {
    println!("✅ Build ready!");
    if let Some(design) = &state.design_system {
        println!("   App: {} ({})", design.metadata.app_name, design.metadata.style);
    }
    println!("   Files: {}", state.file_system.len());
    if let Some(review) = &state.active_review {
        println!(
            "   Review score: {:.0}/100 ({} comment(s))",
            review.overall_score,
            review.comments.len()
        );
    }
    if state.iteration_count > 0 {
        println!("   Self-healing patches: {}", state.iteration_count);
    }
    println!("   Snapshots: {}", state.history.len());
    println!();
    println!("Next steps:");
    println!("  neural files               # list generated files");
    println!("  neural files src/App.tsx   # print a file");
    println!("  neural history             # browse snapshots");
}
