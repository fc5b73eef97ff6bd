//! Plugin hook dispatch.
//!
//! Automatic dispatch runs every enabled plugin bound to a hook, one at a
//! time, each against the state left by the previous one. Manual dispatch
//! runs one enabled plugin immediately and snapshots the result.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use neural_agents::StageClient;
use neural_core::{CoreError, NeuralPlugin, PluginHook, PluginResult};

use crate::error::StudioResult;
use crate::store::ProjectStore;

/// Totals for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub plugins_run: usize,
    pub mutations: usize,
    pub comments: usize,
}

#[derive(Clone)]
pub struct PluginDispatcher {
    store: Arc<ProjectStore>,
    client: Arc<dyn StageClient>,
}

impl PluginDispatcher {
    pub fn new(store: Arc<ProjectStore>, client: Arc<dyn StageClient>) -> Self {
        Self { store, client }
    }

    /// Run every enabled plugin bound to `hook` for the run `generation`.
    pub async fn run_hook(&self, generation: u64, hook: PluginHook) -> StudioResult<DispatchSummary> {
        let plugins: Vec<NeuralPlugin> = self.store.read(|s| {
            s.installed_plugins
                .iter()
                .filter(|p| p.runs_at(hook))
                .cloned()
                .collect()
        });

        let mut summary = DispatchSummary::default();
        if plugins.is_empty() {
            debug!(%hook, "No plugins bound to hook");
            return Ok(summary);
        }

        self.store.log(
            generation,
            format!("[plugin] Running {} {} plugin(s)", plugins.len(), hook),
        )?;

        for plugin in plugins {
            let result = self.invoke(generation, &plugin).await?;
            let (mutations, comments) =
                self.store
                    .apply_plugin_result(generation, &plugin, result)?;
            summary.plugins_run += 1;
            summary.mutations += mutations;
            summary.comments += comments;
        }

        info!(
            %hook,
            plugins = summary.plugins_run,
            mutations = summary.mutations,
            comments = summary.comments,
            "Plugin hook dispatched"
        );
        Ok(summary)
    }

    /// Run one plugin now, whatever the pipeline status.
    ///
    /// The plugin must be enabled and the store must show live state. The
    /// result is snapshotted as `Manual Run: <plugin name>`.
    pub async fn run_manual(&self, id: &str) -> StudioResult<DispatchSummary> {
        let (plugin, generation) = self.store.read(|s| -> StudioResult<_> {
            s.ensure_live()?;
            let plugin = s.find_plugin(id)?.clone();
            if !plugin.enabled {
                return Err(CoreError::PluginDisabled(id.to_string()).into());
            }
            Ok((plugin, self.store.generation()))
        })?;

        info!(plugin = %plugin.id, "Manual plugin run");
        let result = self.invoke(generation, &plugin).await?;
        let (mutations, comments) = self
            .store
            .apply_plugin_result(generation, &plugin, result)?;
        self.store
            .capture_snapshot(generation, &format!("Manual Run: {}", plugin.name))?;

        Ok(DispatchSummary {
            plugins_run: 1,
            mutations,
            comments,
        })
    }

    async fn invoke(&self, generation: u64, plugin: &NeuralPlugin) -> StudioResult<PluginResult> {
        let (files, design) = self
            .store
            .read(|s| (s.file_system.clone(), s.design_system.clone()));
        debug!(plugin = %plugin.id, files = files.len(), "Invoking plugin");
        let result = self
            .client
            .run_plugin(plugin, &files, design.as_ref())
            .await?;
        self.store
            .log_warnings(generation, self.client.take_warnings())?;
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct PluginFile {
    #[serde(default)]
    plugins: Vec<NeuralPlugin>,
}

/// Read extra plugin definitions from a YAML file.
///
/// ```yaml
/// plugins:
///   - id: seo-tuner
///     name: SEO Tuner
///     description: Adds meta tags to index.html
///     hook: post-coding
///     enabled: true
/// ```
pub fn load_plugin_file(path: &Path) -> StudioResult<Vec<NeuralPlugin>> {
    let content = std::fs::read_to_string(path)?;
    parse_plugins(&content)
}

pub fn parse_plugins(content: &str) -> StudioResult<Vec<NeuralPlugin>> {
    let file: PluginFile = serde_yaml::from_str(content)?;
    Ok(file
        .plugins
        .into_iter()
        .filter(|p| !p.id.trim().is_empty())
        .collect())
}
