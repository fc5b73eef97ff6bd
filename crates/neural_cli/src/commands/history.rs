//! History commands - List, inspect and restore snapshots.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Args;

use super::{open_local, resolve_snapshot};

#[derive(Args)]
pub struct HistoryArgs {
    /// Show snapshot ids in full
    #[arg(long)]
    pub full_ids: bool,
}

#[derive(Args)]
pub struct SelectArgs {
    /// Snapshot number (from `neural history`) or id prefix
    #[arg(required_unless_present = "live")]
    pub snapshot: Option<String>,

    /// Leave snapshot mode and return to the live state
    #[arg(long, conflicts_with = "snapshot")]
    pub live: bool,
}

#[derive(Args)]
pub struct RollbackArgs {
    /// Snapshot number (from `neural history`) or id prefix
    pub snapshot: String,
}

pub async fn list(args: HistoryArgs, workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    let state = studio.store().snapshot();

    if state.history.is_empty() {
        println!("No snapshots yet.");
        return Ok(());
    }

    println!("📜 History ({} snapshots)", state.history.len());
    for (i, snapshot) in state.history.iter().enumerate() {
        let selected = state.selected_history_id.as_deref() == Some(snapshot.id.as_str());
        let id = if args.full_ids {
            snapshot.id.as_str()
        } else {
            &snapshot.id[..snapshot.id.len().min(8)]
        };
        println!(
            "{} {:>3}. {}  {}  {:<28} {:>3} files  [{}]",
            if selected { "▸" } else { " " },
            i + 1,
            id,
            format_time(snapshot.timestamp),
            snapshot.label,
            snapshot.file_system.len(),
            snapshot.status,
        );
    }
    Ok(())
}

pub async fn select(args: SelectArgs, workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    let store = studio.store();

    match args.snapshot {
        Some(token) if !args.live => {
            let (id, label) = store.read(|s| {
                resolve_snapshot(s, &token).map(|h| (h.id.clone(), h.label.clone()))
            })?;
            store.select_history(Some(&id))?;
            println!("👁  Viewing \"{}\" (read-only)", label);
            println!("   Use `neural rollback {}` to restore it, or `neural select --live`", token);
        }
        _ => {
            store.select_history(None)?;
            println!("✅ Back to live state");
        }
    }
    Ok(())
}

pub async fn rollback(args: RollbackArgs, workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    let store = studio.store();

    let (id, label) = store.read(|s| {
        resolve_snapshot(s, &args.snapshot).map(|h| (h.id.clone(), h.label.clone()))
    })?;
    store.rollback(&id)?;
    println!("⏪ Restored \"{}\"", label);
    Ok(())
}

fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
