//! # neural_studio
//!
//! The headless NeuralStudio service.
//!
//! # Architecture
//!
//! - **ProjectStore**: owns the project state, applies commands, persists
//!   after every change and broadcasts [`StateEvent`]s
//! - **Orchestrator**: watches the status channel and runs one stage
//!   handler at a time
//! - **PluginDispatcher**: post-coding / post-audit hooks and manual runs
//! - **BuildSimulator**: the simulated `compiling` stage
//! - **ResourceTicker**: cosmetic CPU/memory/VFS metrics
//!
//! [`Studio`] wires them together for one workspace.

pub mod compiler;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod plugins;
pub mod simulator;
pub mod storage;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use neural_agents::StageClient;
use neural_core::AgentStatus;

pub use compiler::{BuildOutcome, BuildSimulator};
pub use config::{
    ParsingConfig, PipelineConfig, PluginsConfig, StorageConfig, StudioConfig, CONFIG_FILE,
};
pub use error::{StudioError, StudioResult};
pub use events::{StateEvent, StatusTick};
pub use orchestrator::Orchestrator;
pub use plugins::{load_plugin_file, parse_plugins, DispatchSummary, PluginDispatcher};
pub use simulator::ResourceTicker;
pub use storage::{FileStorage, MemoryStorage, StatePersistence, StorageBackend};
pub use store::ProjectStore;

/// A running studio: store, orchestrator watcher and optional ticker.
pub struct Studio {
    config: StudioConfig,
    store: Arc<ProjectStore>,
    orchestrator: Arc<Orchestrator>,
    watcher: JoinHandle<()>,
    ticker: Option<ResourceTicker>,
}

impl Studio {
    /// Open the studio for `workspace`, persisting under its storage file.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn open(
        workspace: &Path,
        config: StudioConfig,
        client: Arc<dyn StageClient>,
    ) -> StudioResult<Self> {
        let backend = Arc::new(FileStorage::new(workspace.join(&config.storage.file)));
        let plugin_file = workspace.join(&config.plugins.file);
        let studio = Self::with_backend(config, client, backend)?;

        // A selected snapshot freezes the registry until the next open
        if plugin_file.exists() && !studio.store.read(|s| s.is_snapshot_mode()) {
            let added = studio
                .store
                .install_plugins(load_plugin_file(&plugin_file)?)?;
            if added > 0 {
                info!("Installed {} plugin(s) from {}", added, plugin_file.display());
            }
        }
        Ok(studio)
    }

    /// Open the studio on an explicit storage backend.
    pub fn with_backend(
        config: StudioConfig,
        client: Arc<dyn StageClient>,
        backend: Arc<dyn StorageBackend>,
    ) -> StudioResult<Self> {
        config.validate()?;
        let persistence = StatePersistence::new(backend, config.storage.key.clone());
        let store = Arc::new(ProjectStore::open(persistence));
        let builder = BuildSimulator::new(&config.pipeline);
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), client, builder));
        let watcher = orchestrator.clone().spawn();

        Ok(Self {
            config,
            store,
            orchestrator,
            watcher,
            ticker: None,
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ProjectStore> {
        &self.store
    }

    /// Begin a run; the orchestrator picks it up. Returns the run's generation.
    pub fn start_run(&self, prompt: &str) -> StudioResult<u64> {
        self.store.start_run(prompt)
    }

    /// Wait until run `generation` reaches `ready`/`error` or is superseded.
    pub async fn wait_until_settled(&self, generation: u64) -> StudioResult<AgentStatus> {
        let mut rx = self.store.subscribe_status();
        loop {
            let tick = *rx.borrow_and_update();
            if tick.generation != generation || tick.status.is_settled() {
                return Ok(tick.status);
            }
            rx.changed()
                .await
                .map_err(|_| StudioError::OrchestratorStopped)?;
        }
    }

    /// Start a run and wait for it to settle.
    pub async fn run(&self, prompt: &str) -> StudioResult<AgentStatus> {
        let generation = self.start_run(prompt)?;
        self.wait_until_settled(generation).await
    }

    /// Run one plugin on demand.
    pub async fn run_plugin(&self, id: &str) -> StudioResult<DispatchSummary> {
        self.orchestrator.plugins().run_manual(id).await
    }

    /// Start the cosmetic resource ticker if it is not running.
    pub fn start_resource_ticker(&mut self) {
        if self.ticker.is_none() {
            self.ticker = Some(ResourceTicker::spawn(
                self.store.clone(),
                self.config.simulator.clone(),
            ));
        }
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
