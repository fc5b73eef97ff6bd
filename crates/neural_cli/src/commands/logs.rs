//! Logs command - Print the terminal log.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::open_local;

#[derive(Args)]
pub struct LogsArgs {
    /// Only print the last N lines
    #[arg(short = 'n', long)]
    pub tail: Option<usize>,
}

pub async fn execute(args: LogsArgs, workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    // Snapshot mode shows the snapshot's log, like the file view
    let lines = studio.store().read(|s| match s.selected_snapshot() {
        Some(snapshot) => snapshot.terminal_logs.clone(),
        None => s.terminal_logs.clone(),
    });

    let skip = args
        .tail
        .map(|n| lines.len().saturating_sub(n))
        .unwrap_or(0);
    for line in &lines[skip..] {
        println!("{}", line);
    }
    Ok(())
}
