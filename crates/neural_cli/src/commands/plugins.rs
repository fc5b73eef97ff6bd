//! Plugins command - List, toggle, install and run plugins.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};

use neural_studio::load_plugin_file;

use super::{load_config, open_local, open_studio};

#[derive(Args)]
pub struct PluginsArgs {
    #[command(subcommand)]
    pub action: Option<PluginAction>,
}

#[derive(Subcommand)]
pub enum PluginAction {
    /// List installed plugins (default)
    List,

    /// Enable or disable a plugin
    Toggle {
        /// Plugin id
        id: String,
    },

    /// Install plugins from a YAML file
    Install {
        /// YAML file with a top-level `plugins:` list
        file: PathBuf,
    },

    /// Run one enabled plugin now
    Run {
        /// Plugin id
        id: String,

        /// Use the built-in mock agents instead of an LLM
        #[arg(long)]
        offline: bool,
    },
}

pub async fn execute(args: PluginsArgs, workspace: &Path) -> Result<()> {
    match args.action.unwrap_or(PluginAction::List) {
        PluginAction::List => list(workspace),
        PluginAction::Toggle { id } => {
            let studio = open_local(workspace)?;
            let enabled = studio.store().toggle_plugin(&id)?;
            println!(
                "{} {} {}",
                if enabled { "🟢" } else { "⚪" },
                id,
                if enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        PluginAction::Install { file } => {
            let plugins = load_plugin_file(&file)?;
            let studio = open_local(workspace)?;
            let added = studio.store().install_plugins(plugins)?;
            println!("📦 Installed {} plugin(s) from {}", added, file.display());
            Ok(())
        }
        PluginAction::Run { id, offline } => {
            let config = load_config(workspace)?;
            let studio = open_studio(workspace, config, offline)?;
            println!("🔌 Running {}...", id);
            let summary = studio.run_plugin(&id).await?;
            println!(
                "   ✅ {} mutation(s), {} comment(s)",
                summary.mutations, summary.comments
            );
            Ok(())
        }
    }
}

fn list(workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    let plugins = studio.store().read(|s| s.installed_plugins.clone());

    println!("🔌 Plugins ({})", plugins.len());
    for plugin in plugins {
        println!(
            "  {} {:<20} {:<12} {}",
            if plugin.enabled { "🟢" } else { "⚪" },
            plugin.id,
            plugin.hook,
            plugin.description
        );
    }
    Ok(())
}
