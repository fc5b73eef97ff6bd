//! Background resource ticker.
//!
//! Runs independently of the orchestrator on a fixed interval and only
//! reads the file system and status. Aborted when dropped.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use neural_core::{ResourceSimulator, SimulatorConfig};

use crate::store::ProjectStore;

pub struct ResourceTicker {
    handle: JoinHandle<()>,
}

impl ResourceTicker {
    pub fn spawn(store: Arc<ProjectStore>, config: SimulatorConfig) -> Self {
        let period = Duration::from_millis(config.tick_ms.max(1));
        let simulator = ResourceSimulator::new(config);

        let handle = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.update_resources(|resources, files, status| {
                    simulator.tick(resources, files, status, &mut rng);
                    trace!(cpu = resources.cpu, memory = resources.memory, "resource tick");
                });
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ResourceTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
