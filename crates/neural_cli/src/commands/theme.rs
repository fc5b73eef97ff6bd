//! Theme command - Show or edit design tokens.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::Value;

use neural_core::{CoreError, DesignSystem};

use super::open_local;

#[derive(Args)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub action: Option<ThemeAction>,
}

#[derive(Subcommand)]
pub enum ThemeAction {
    /// Print every token (default)
    Show,

    /// Overwrite one token, e.g. `colors.primary "#ff0066"`
    Set {
        /// Dotted token path
        path: String,
        /// New value
        value: String,
    },
}

pub async fn execute(args: ThemeArgs, workspace: &Path) -> Result<()> {
    let studio = open_local(workspace)?;
    let store = studio.store();

    match args.action.unwrap_or(ThemeAction::Show) {
        ThemeAction::Show => {
            let design = store
                .read(|s| s.active_design_system().cloned())
                .ok_or(CoreError::NoDesignSystem)?;
            println!("🎨 {}", design.metadata.app_name);
            for (path, value) in flatten_tokens(&design)? {
                println!("  {:<26} {}", path, value);
            }
        }
        ThemeAction::Set { path, value } => {
            store.update_theme(&path, &value)?;
            println!("🎨 {} = {}", path, value);
        }
    }
    Ok(())
}

/// Dotted path and value of every string token.
fn flatten_tokens(design: &DesignSystem) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    if let Value::Object(groups) = serde_json::to_value(design)? {
        for (group, tokens) in groups {
            if let Value::Object(tokens) = tokens {
                for (name, value) in tokens {
                    if let Value::String(value) = value {
                        out.push((format!("{}.{}", group, name), value));
                    }
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_tokens_uses_settable_paths() {
        let design = DesignSystem::fallback("todo app");
        let tokens = flatten_tokens(&design).unwrap();

        let primary = tokens
            .iter()
            .find(|(path, _)| path == "colors.primary")
            .unwrap();
        assert_eq!(primary.1, "#6366f1");
        assert!(tokens.iter().any(|(path, _)| path == "layout.borderRadius"));
        assert!(tokens
            .iter()
            .any(|(path, value)| path == "metadata.appName" && value == "Todo App"));

        // Every listed path can be written back
        let mut copy = design.clone();
        for (path, _) in &tokens {
            copy.set_token(path, "x").unwrap();
        }
    }
}
