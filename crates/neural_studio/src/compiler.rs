//! Simulated build for the `compiling` stage.
//!
//! Nothing is compiled. The build waits a fixed delay and may report an
//! injected failure so the healing stage has something to do. Injection is
//! gated by the run's heal count first, so a run never heals more than
//! `max_heal_attempts` times whatever the probability.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use neural_core::FileSystem;

use crate::config::PipelineConfig;

/// Result of one build attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Success { modules: usize },
    Failed { file: String, error: String },
}

pub struct BuildSimulator {
    delay: Duration,
    failure_probability: f64,
    max_heal_attempts: u32,
    target_file: String,
    error: String,
    rng: Mutex<StdRng>,
}

impl BuildSimulator {
    pub fn new(config: &PipelineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let p = config.failure_probability;
        Self {
            delay: Duration::from_millis(config.compile_delay_ms),
            failure_probability: if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 },
            max_heal_attempts: config.max_heal_attempts,
            target_file: config.heal_target_file.clone(),
            error: config.synthetic_error.clone(),
            rng: Mutex::new(rng),
        }
    }

    /// Whether this attempt fails. Never true once the heal budget is spent.
    pub fn should_fail(&self, iteration_count: u32) -> bool {
        if iteration_count >= self.max_heal_attempts {
            return false;
        }
        self.rng.lock().gen_bool(self.failure_probability)
    }

    /// File the patcher should repair: the configured one, or the first file.
    pub fn heal_target(&self, files: &FileSystem) -> Option<String> {
        if files.contains_key(&self.target_file) {
            Some(self.target_file.clone())
        } else {
            files.keys().next().cloned()
        }
    }

    pub fn synthetic_error(&self) -> &str {
        &self.error
    }

    /// Run one simulated build.
    pub async fn build(&self, files: &FileSystem, iteration_count: u32) -> BuildOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail = self.should_fail(iteration_count);
        debug!(iteration_count, fail, "Simulated build finished");

        match (fail, self.heal_target(files)) {
            (true, Some(file)) => BuildOutcome::Failed {
                error: format!("{}: {}", file, self.error),
                file,
            },
            _ => BuildOutcome::Success {
                modules: files.len(),
            },
        }
    }
}
