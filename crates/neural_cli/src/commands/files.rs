//! Files and edit commands - Browse and change the virtual file system.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use super::open_local;

#[derive(Args)]
pub struct FilesArgs {
    /// File to print; it also becomes the current file
    pub path: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// File to replace
    pub path: String,

    /// New content (reads stdin when neither --content nor --from is given)
    #[arg(long, conflicts_with = "from")]
    pub content: Option<String>,

    /// Read the new content from a local file
    #[arg(long)]
    pub from: Option<PathBuf>,
}

pub async fn execute(args: FilesArgs, workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    let store = studio.store();

    let Some(path) = args.path else {
        let (files, current, snapshot) = store.read(|s| {
            let files: Vec<(String, usize)> = s
                .active_file_system()
                .iter()
                .map(|(path, content)| (path.clone(), content.len()))
                .collect();
            (
                files,
                s.current_file.clone(),
                s.selected_snapshot().map(|h| h.label.clone()),
            )
        });

        if let Some(label) = snapshot {
            println!("👁  Snapshot \"{}\"", label);
        }
        if files.is_empty() {
            println!("No files yet.");
        }
        for (path, bytes) in files {
            let marker = if current.as_deref() == Some(path.as_str()) {
                "▸"
            } else {
                " "
            };
            println!("{} {:<40} {:>7} B", marker, path, bytes);
        }
        return Ok(());
    };

    store.set_current_file(&path)?;
    let content = store.read(|s| s.active_file_system().get(&path).cloned());
    if let Some(content) = content {
        println!("{}", content);
    }
    Ok(())
}

pub async fn edit(args: EditArgs, workspace: &Path) -> Result<()> {
    let content = match (args.content, args.from) {
        (Some(content), _) => content,
        (None, Some(from)) => std::fs::read_to_string(&from)
            .with_context(|| format!("Reading {}", from.display()))?,
        (None, None) => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Reading new content from stdin")?;
            buffer
        }
    };

    let studio = open_local(workspace)?;
    studio.store().edit_file(&args.path, content)?;
    println!("✏️  Updated {}", args.path);
    Ok(())
}
