//! Save and reset commands.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;
use clap::Args;

use super::open_local;

#[derive(Args)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn save(workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    studio.store().save()?;
    println!("💾 Project saved");
    Ok(())
}

pub async fn reset(args: ResetArgs, workspace: &Path) -> Result<()> {
    if !args.yes && !confirm("Discard the whole session, including history?")? {
        println!("Aborted.");
        return Ok(());
    }

    let studio = open_local(workspace)?;
    studio.store().reset()?;
    println!("🧹 Session cleared");
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
