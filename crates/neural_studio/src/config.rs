//! Studio configuration.
//!
//! Loaded from `neural.toml` in the workspace root when present, then
//! overridden by `NEURAL_*` environment variables. API keys are never part
//! of the file; the LLM adapter reads them from the environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use neural_agents::{LlmProvider, LlmSettings, ParsePolicy};
use neural_core::SimulatorConfig;

use crate::error::{StudioError, StudioResult};

/// Name of the configuration file in the workspace root.
pub const CONFIG_FILE: &str = "neural.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub llm: LlmSettings,
    pub pipeline: PipelineConfig,
    pub parsing: ParsingConfig,
    pub simulator: SimulatorConfig,
    pub storage: StorageConfig,
    pub plugins: PluginsConfig,
}

/// Compile and heal behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Simulated build time
    pub compile_delay_ms: u64,
    /// Chance that the first build attempt fails
    pub failure_probability: f64,
    /// Hard ceiling on healing cycles per run
    pub max_heal_attempts: u32,
    /// File handed to the patcher
    pub heal_target_file: String,
    /// Build error shown to the patcher
    pub synthetic_error: String,
    /// Seed for the build failure RNG; random when unset
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compile_delay_ms: 1200,
            failure_probability: 0.3,
            max_heal_attempts: 1,
            heal_target_file: "src/App.tsx".to_string(),
            synthetic_error:
                "TS2322: Type 'string | undefined' is not assignable to type 'string'."
                    .to_string(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub policy: ParsePolicy,
}

/// Where the state blob lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key/value file, relative to the workspace root
    pub file: String,
    /// Key the state blob is stored under
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file: ".neural/storage.json".to_string(),
            key: "neural-studio-state".to_string(),
        }
    }
}

/// Extra plugin definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// YAML file relative to the workspace root
    pub file: String,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            file: "plugins.yaml".to_string(),
        }
    }
}

impl StudioConfig {
    /// Load `neural.toml` from `workspace` (if present) and apply environment overrides.
    pub fn load(workspace: &Path) -> StudioResult<Self> {
        let path = workspace.join(CONFIG_FILE);
        let mut config = if path.exists() {
            debug!("Loading configuration from {}", path.display());
            Self::from_toml(&std::fs::read_to_string(&path)?)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> StudioResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `NEURAL_*` overrides using `lookup` to resolve variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> StudioResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("NEURAL_LLM_PROVIDER") {
            self.llm.provider =
                LlmProvider::parse(&provider).map_err(|e| StudioError::config(e.to_string()))?;
        }
        if let Some(model) = lookup("NEURAL_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(policy) = lookup("NEURAL_PARSE_POLICY") {
            self.parsing.policy = policy
                .parse()
                .map_err(|_| StudioError::config(format!("invalid NEURAL_PARSE_POLICY '{}'", policy)))?;
        }
        if let Some(p) = lookup("NEURAL_FAILURE_PROBABILITY") {
            self.pipeline.failure_probability = p.trim().parse().map_err(|_| {
                StudioError::config(format!("invalid NEURAL_FAILURE_PROBABILITY '{}'", p))
            })?;
        }
        if let Some(ms) = lookup("NEURAL_COMPILE_DELAY_MS") {
            self.pipeline.compile_delay_ms = ms.trim().parse().map_err(|_| {
                StudioError::config(format!("invalid NEURAL_COMPILE_DELAY_MS '{}'", ms))
            })?;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> StudioResult<()> {
        let p = self.pipeline.failure_probability;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(StudioError::config(format!(
                "failure_probability must be within [0, 1], got {}",
                p
            )));
        }
        if self.pipeline.heal_target_file.trim().is_empty() {
            return Err(StudioError::config("heal_target_file must not be empty"));
        }
        if self.simulator.tick_ms == 0 {
            return Err(StudioError::config("simulator.tick_ms must be positive"));
        }
        if self.storage.key.trim().is_empty() {
            return Err(StudioError::config("storage.key must not be empty"));
        }
        Ok(())
    }
}
