//! Stage orchestrator.
//!
//! A single watcher task observes the store's status channel and runs the
//! handler for each newly entered active status, one at a time. Every
//! handler performs its stage's work and ends by transitioning to the next
//! status, which wakes the watcher again. Ticks are deduplicated by
//! `(generation, seq)`, so a handler never runs twice for the same entry.
//!
//! A handler is dropped as soon as its generation is superseded (reset,
//! rollback, new run). Results that still race past that are rejected by
//! the store's generation check and discarded.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use neural_agents::StageClient;
use neural_core::{AgentStatus, CoreError, PluginHook};

use crate::compiler::{BuildOutcome, BuildSimulator};
use crate::error::StudioResult;
use crate::events::StatusTick;
use crate::plugins::PluginDispatcher;
use crate::store::ProjectStore;

pub struct Orchestrator {
    store: Arc<ProjectStore>,
    client: Arc<dyn StageClient>,
    plugins: PluginDispatcher,
    builder: BuildSimulator,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ProjectStore>,
        client: Arc<dyn StageClient>,
        builder: BuildSimulator,
    ) -> Self {
        let plugins = PluginDispatcher::new(store.clone(), client.clone());
        Self {
            store,
            client,
            plugins,
            builder,
        }
    }

    pub fn plugins(&self) -> &PluginDispatcher {
        &self.plugins
    }

    /// Start the watcher task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.store.subscribe_status();
        tokio::spawn(async move {
            let mut filter = TickFilter::default();
            loop {
                let tick = *rx.borrow_and_update();
                if filter.admit(&tick) {
                    tokio::select! {
                        _ = self.handle(tick) => {}
                        _ = superseded(rx.clone(), tick.generation) => {
                            info!(
                                generation = tick.generation,
                                status = %tick.status,
                                "Stage handler cancelled: run superseded"
                            );
                        }
                    }
                    // The handler usually published a new status already
                    continue;
                }
                if rx.changed().await.is_err() {
                    debug!("Status channel closed, orchestrator stopping");
                    break;
                }
            }
        })
    }

    /// Run the handler for `tick` and turn failures into `status = error`.
    pub async fn handle(&self, tick: StatusTick) {
        debug!(generation = tick.generation, status = %tick.status, "Dispatching stage");
        match self.dispatch(tick.generation, tick.status).await {
            Ok(()) => {}
            Err(e) if e.is_stale() => {
                info!(status = %tick.status, "Discarded stale stage result: {}", e);
            }
            Err(e) => {
                error!(status = %tick.status, "Stage failed: {}", e);
                if let Err(fail_err) = self.store.fail(tick.generation, e.to_string()) {
                    debug!("Could not record failure: {}", fail_err);
                }
            }
        }
    }

    /// The single dispatcher: one handler per active status.
    pub async fn dispatch(&self, generation: u64, status: AgentStatus) -> StudioResult<()> {
        match status {
            AgentStatus::Managing => self.manage(generation).await,
            AgentStatus::Planning => self.plan(generation).await,
            AgentStatus::Designing => self.design(generation).await,
            AgentStatus::Architecting => self.architect(generation).await,
            AgentStatus::Coding => self.code(generation).await,
            AgentStatus::Reviewing => self.review(generation).await,
            AgentStatus::Compiling => self.compile(generation).await,
            AgentStatus::Healing => self.heal(generation).await,
            AgentStatus::Idle | AgentStatus::Ready | AgentStatus::Error => Ok(()),
        }
    }

    fn surface_warnings(&self, generation: u64) -> StudioResult<()> {
        self.store
            .log_warnings(generation, self.client.take_warnings())
    }

    async fn manage(&self, generation: u64) -> StudioResult<()> {
        let prompt = self.store.read(|s| s.user_prompt.clone());
        self.store
            .log(generation, "[manager] Analyzing requirements...")?;

        let srs = self.client.manage(&prompt).await?;
        self.surface_warnings(generation)?;

        self.store.apply(generation, |s| {
            s.log(format!("[manager] Requirements drafted ({} chars)", srs.len()));
            s.srs = Some(srs);
            Ok(())
        })?;
        self.store.transition(generation, AgentStatus::Planning)
    }

    async fn plan(&self, generation: u64) -> StudioResult<()> {
        let srs = self
            .store
            .read(|s| s.srs.clone())
            .ok_or(missing(AgentStatus::Planning, "srs"))?;
        self.store.log(generation, "[planner] Breaking down features...")?;

        let plan = self.client.plan(&srs).await?;
        self.surface_warnings(generation)?;

        self.store.apply(generation, |s| {
            s.log(format!(
                "[planner] {} features, {} files, {} dependencies",
                plan.features.len(),
                plan.files.len(),
                plan.dependencies.len()
            ));
            s.plan = Some(plan);
            Ok(())
        })?;
        self.store.transition(generation, AgentStatus::Designing)
    }

    async fn design(&self, generation: u64) -> StudioResult<()> {
        let (prompt, features) = self.store.read(|s| {
            (
                s.user_prompt.clone(),
                s.plan.as_ref().map(|p| p.features.clone()),
            )
        });
        let features = features.ok_or(missing(AgentStatus::Designing, "plan"))?;
        self.store
            .log(generation, "[designer] Generating design tokens...")?;

        let design = self.client.design(&prompt, &features).await?;
        self.surface_warnings(generation)?;

        self.store.apply(generation, |s| {
            s.log(format!(
                "[designer] \"{}\" in {} style, primary {}",
                design.metadata.app_name, design.metadata.style, design.colors.primary
            ));
            s.design_system = Some(design);
            Ok(())
        })?;
        self.store.transition(generation, AgentStatus::Architecting)
    }

    async fn architect(&self, generation: u64) -> StudioResult<()> {
        let files = self
            .store
            .read(|s| s.plan.as_ref().map(|p| p.files.clone()))
            .ok_or(missing(AgentStatus::Architecting, "plan"))?;

        self.store.apply(generation, |s| {
            s.scaffold_files(&files);
            s.log(format!("[architect] Scaffolded {} files", files.len()));
            Ok(())
        })?;
        self.store.transition(generation, AgentStatus::Coding)
    }

    /// Files are generated strictly one after another so `currentFile`
    /// always names the file in flight.
    async fn code(&self, generation: u64) -> StudioResult<()> {
        let paths: Vec<String> = self.store.read(|s| s.file_system.keys().cloned().collect());
        let total = paths.len();

        for (index, path) in paths.iter().enumerate() {
            self.store.apply(generation, |s| {
                s.current_file = Some(path.clone());
                s.log(format!("[coder] ({}/{}) Writing {}", index + 1, total, path));
                Ok(())
            })?;

            let (plan, design, files) = self.store.read(|s| {
                (s.plan.clone(), s.design_system.clone(), s.file_system.clone())
            });
            let plan = plan.ok_or(missing(AgentStatus::Coding, "plan"))?;
            let design = design.ok_or(missing(AgentStatus::Coding, "designSystem"))?;

            let content = self.client.code(path, &plan, &design, &files).await?;
            if content.is_empty() {
                warn!(file = %path, "Empty generation, keeping placeholder");
                self.store
                    .log(generation, format!("[coder] {} came back empty, kept as is", path))?;
                continue;
            }
            self.store.write_file(generation, path, content)?;
        }

        self.plugins.run_hook(generation, PluginHook::PostCoding).await?;
        self.store.transition(generation, AgentStatus::Reviewing)
    }

    async fn review(&self, generation: u64) -> StudioResult<()> {
        let (files, design, carried) = self.store.read(|s| {
            (
                s.file_system.clone(),
                s.design_system.clone(),
                s.active_review
                    .as_ref()
                    .map(|r| r.comments.clone())
                    .unwrap_or_default(),
            )
        });
        let design = design.ok_or(missing(AgentStatus::Reviewing, "designSystem"))?;
        self.store.log(generation, "[reviewer] Auditing project...")?;

        let mut report = self.client.review(&files, &design).await?;
        self.surface_warnings(generation)?;

        // Post-coding plugin findings stay at the top of the report
        if !carried.is_empty() {
            report.comments.splice(0..0, carried);
        }
        self.store.apply(generation, |s| {
            s.log(format!(
                "[reviewer] Score {:.0}/100, {} comment(s)",
                report.overall_score,
                report.comments.len()
            ));
            s.active_review = Some(report);
            Ok(())
        })?;

        self.plugins.run_hook(generation, PluginHook::PostAudit).await?;
        self.store.transition(generation, AgentStatus::Compiling)
    }

    async fn compile(&self, generation: u64) -> StudioResult<()> {
        let (files, iteration_count) =
            self.store.read(|s| (s.file_system.clone(), s.iteration_count));
        self.store.log(
            generation,
            format!("[build] Compiling {} modules...", files.len()),
        )?;

        match self.builder.build(&files, iteration_count).await {
            BuildOutcome::Success { modules } => {
                self.store.log(
                    generation,
                    format!("[build] Build succeeded ({} modules)", modules),
                )?;
                self.store.transition(generation, AgentStatus::Ready)?;
                info!(generation, "Run completed");
                Ok(())
            }
            BuildOutcome::Failed { file, error } => {
                warn!(generation, file = %file, "Injected build failure");
                self.store
                    .log(generation, format!("[build] Error in {}", error))?;
                self.store.transition(generation, AgentStatus::Healing)
            }
        }
    }

    async fn heal(&self, generation: u64) -> StudioResult<()> {
        let files = self.store.read(|s| s.file_system.clone());
        let file = self
            .builder
            .heal_target(&files)
            .ok_or(missing(AgentStatus::Healing, "fileSystem"))?;
        let content = files.get(&file).cloned().unwrap_or_default();
        let error = self.builder.synthetic_error().to_string();
        self.store
            .log(generation, format!("[patcher] Repairing {}...", file))?;

        let patched = self.client.patch(&file, &content, &error).await?;

        self.store.apply(generation, |s| {
            s.write_file(file.clone(), patched);
            s.current_file = Some(file.clone());
            s.iteration_count += 1;
            s.log(format!(
                "[patcher] Patched {} (attempt {})",
                file, s.iteration_count
            ));
            Ok(())
        })?;
        self.store.transition(generation, AgentStatus::Compiling)
    }
}

/// Admits each active tick once per `(generation, seq)`.
#[derive(Debug, Default)]
struct TickFilter {
    last: Option<(u64, u64)>,
}

impl TickFilter {
    fn admit(&mut self, tick: &StatusTick) -> bool {
        let key = (tick.generation, tick.seq);
        if !tick.status.is_active() || self.last == Some(key) {
            return false;
        }
        self.last = Some(key);
        true
    }
}

fn missing(status: AgentStatus, missing: &'static str) -> CoreError {
    CoreError::MissingPrecondition { status, missing }
}

/// Resolves once the run `generation` has been superseded.
async fn superseded(mut rx: watch::Receiver<StatusTick>, generation: u64) {
    loop {
        if rx.borrow_and_update().generation != generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
