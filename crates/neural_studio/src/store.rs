//! The state-owning service.
//!
//! [`ProjectStore`] wraps the single [`ProjectState`] value. Nothing
//! outside this module mutates it: stage handlers and user actions call
//! commands, each command is applied atomically under the write lock,
//! persisted, and announced as [`StateEvent`]s.
//!
//! Commands issued on behalf of a run carry the run's generation. Reset,
//! rollback and a new run bump the generation, and any later command
//! carrying an older one fails with [`StudioError::StaleGeneration`]
//! without touching state.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use neural_core::{
    AgentStatus, CoreResult, FileSystem, NeuralPlugin, PluginResult, ProjectState, Resources,
};

use crate::error::{StudioError, StudioResult};
use crate::events::{StateEvent, StatusTick};
use crate::storage::StatePersistence;

const EVENT_CAPACITY: usize = 256;

/// Who a command is issued for.
#[derive(Debug, Clone, Copy)]
enum Scope {
    /// A stage handler of the given generation
    Run(u64),
    /// A user action, valid in any generation
    User,
    /// A user action that supersedes the current run on success
    NewGeneration,
}

/// What a commit compares against to derive events.
struct Marks {
    generation: u64,
    status: AgentStatus,
    history_len: usize,
    log_len: usize,
    current_file: Option<String>,
}

impl Marks {
    fn of(state: &ProjectState, generation: u64) -> Self {
        Self {
            generation,
            status: state.status,
            history_len: state.history.len(),
            log_len: state.terminal_logs.len(),
            current_file: state.current_file.clone(),
        }
    }
}

/// Single source of truth for a session.
pub struct ProjectStore {
    state: RwLock<ProjectState>,
    generation: AtomicU64,
    seq: AtomicU64,
    events: broadcast::Sender<StateEvent>,
    status: watch::Sender<StatusTick>,
    persistence: StatePersistence,
}

impl ProjectStore {
    /// Restore state from `persistence` (or start fresh).
    pub fn open(persistence: StatePersistence) -> Self {
        let state = persistence.load();
        info!(
            status = %state.status,
            files = state.file_system.len(),
            snapshots = state.history.len(),
            "Project state restored"
        );
        Self::with_state(state, persistence)
    }

    pub fn with_state(state: ProjectState, persistence: StatePersistence) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(StatusTick {
            generation: 0,
            seq: 0,
            status: state.status,
        });
        Self {
            state: RwLock::new(state),
            generation: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            events,
            status,
            persistence,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusTick> {
        self.status.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> AgentStatus {
        self.state.read().status
    }

    /// Clone of the whole state.
    pub fn snapshot(&self) -> ProjectState {
        self.state.read().clone()
    }

    /// Run `f` against the state under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ProjectState) -> R) -> R {
        f(&*self.state.read())
    }

    pub fn persistence(&self) -> &StatePersistence {
        &self.persistence
    }

    /// Fail unless `generation` is still the current one.
    pub fn check_generation(&self, generation: u64) -> StudioResult<()> {
        let current = self.generation();
        if generation != current {
            return Err(StudioError::StaleGeneration {
                expected: current,
                actual: generation,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Run commands
    // =========================================================================

    /// Begin a run; returns its generation.
    pub fn start_run(&self, prompt: &str) -> StudioResult<u64> {
        self.commit(Scope::NewGeneration, true, |state, _| {
            state.start_run(prompt).map(|_| ())
        })?;
        let generation = self.generation();
        info!(generation, "Run started");
        Ok(generation)
    }

    /// Move the run to `next` through the transition table.
    pub fn transition(&self, generation: u64, next: AgentStatus) -> StudioResult<()> {
        self.commit(Scope::Run(generation), true, |state, _| {
            state.transition(next).map(|_| ())
        })
    }

    /// Apply a stage's own mutation for `generation`.
    pub fn apply<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut ProjectState) -> CoreResult<R>,
    ) -> StudioResult<R> {
        self.commit(Scope::Run(generation), true, |state, _| f(state))
    }

    /// Append a log line on behalf of a run.
    pub fn log(&self, generation: u64, line: impl Into<String>) -> StudioResult<()> {
        let line = line.into();
        self.apply(generation, |state| {
            state.log(line);
            Ok(())
        })
    }

    /// Surface agent warnings (fallback substitutions) in the terminal log.
    pub fn log_warnings(&self, generation: u64, warnings: Vec<String>) -> StudioResult<()> {
        if warnings.is_empty() {
            return Ok(());
        }
        self.apply(generation, |state| {
            for warning in warnings {
                state.log(format!("[warn] {}", warning));
            }
            Ok(())
        })
    }

    /// Store generated content for one file.
    pub fn write_file(
        &self,
        generation: u64,
        path: &str,
        content: impl Into<String>,
    ) -> StudioResult<()> {
        let content = content.into();
        self.commit(Scope::Run(generation), true, |state, events| {
            state.write_file(path, content);
            events.push(StateEvent::FileWritten {
                path: path.to_string(),
            });
            Ok(())
        })
    }

    /// Merge a plugin result into live state.
    pub fn apply_plugin_result(
        &self,
        generation: u64,
        plugin: &NeuralPlugin,
        result: PluginResult,
    ) -> StudioResult<(usize, usize)> {
        self.commit(Scope::Run(generation), true, |state, events| {
            events.extend(result.mutations.iter().map(|m| StateEvent::FileWritten {
                path: m.path.clone(),
            }));
            Ok(state.apply_plugin_result(plugin, result))
        })
    }

    /// Capture a labeled snapshot; returns its id.
    pub fn capture_snapshot(&self, generation: u64, label: &str) -> StudioResult<String> {
        self.commit(Scope::Run(generation), true, |state, _| {
            Ok(state.capture_snapshot(label).id.clone())
        })
    }

    /// Halt the run with `status = error`.
    pub fn fail(&self, generation: u64, message: impl AsRef<str>) -> StudioResult<()> {
        let message = message.as_ref();
        warn!(generation, "Run halted: {}", message);
        self.commit(Scope::Run(generation), true, |state, _| {
            state.fail(message);
            Ok(())
        })
    }

    // =========================================================================
    // User commands
    // =========================================================================

    pub fn set_current_file(&self, path: &str) -> StudioResult<()> {
        self.commit(Scope::User, true, |state, _| state.set_current_file(path))
    }

    /// Editor change to a live file.
    pub fn edit_file(&self, path: &str, content: impl Into<String>) -> StudioResult<()> {
        let content = content.into();
        self.commit(Scope::User, true, |state, events| {
            state.edit_file(path, content)?;
            events.push(StateEvent::FileWritten {
                path: path.to_string(),
            });
            Ok(())
        })
    }

    /// Enter snapshot mode for `id`, or return to live state with `None`.
    pub fn select_history(&self, id: Option<&str>) -> StudioResult<()> {
        self.commit(Scope::User, true, |state, events| {
            state.select_history(id)?;
            events.push(StateEvent::HistorySelected {
                id: id.map(str::to_string),
            });
            Ok(())
        })
    }

    /// Restore a snapshot into live state; supersedes any run in flight.
    pub fn rollback(&self, id: &str) -> StudioResult<()> {
        self.commit(Scope::NewGeneration, true, |state, events| {
            state.rollback(id)?;
            events.push(StateEvent::RolledBack { id: id.to_string() });
            Ok(())
        })?;
        info!(snapshot = id, "Rolled back");
        Ok(())
    }

    pub fn toggle_plugin(&self, id: &str) -> StudioResult<bool> {
        self.commit(Scope::User, true, |state, events| {
            let enabled = state.toggle_plugin(id)?;
            events.push(StateEvent::PluginToggled {
                id: id.to_string(),
                enabled,
            });
            Ok(enabled)
        })
    }

    pub fn install_plugins(&self, plugins: Vec<NeuralPlugin>) -> StudioResult<usize> {
        self.commit(Scope::User, true, |state, _| state.install_plugins(plugins))
    }

    /// Theme editor: overwrite one design token.
    pub fn update_theme(&self, path: &str, value: &str) -> StudioResult<()> {
        self.commit(Scope::User, true, |state, events| {
            state.update_design_token(path, value)?;
            events.push(StateEvent::ThemeUpdated {
                path: path.to_string(),
                value: value.to_string(),
            });
            Ok(())
        })
    }

    /// Write the blob now, reporting storage failures.
    pub fn save(&self) -> StudioResult<()> {
        let mut state = self.state.write();
        let before = Marks::of(&state, self.generation());
        state.log("[system] Project saved");
        self.publish(&state, before, vec![StateEvent::Saved]);
        self.persistence.save(&state)?;
        info!("Project saved");
        Ok(())
    }

    /// Replace state with a fresh default and clear persisted storage.
    pub fn reset(&self) -> StudioResult<()> {
        self.commit(Scope::NewGeneration, false, |state, events| {
            *state = ProjectState::default();
            events.push(StateEvent::Reset);
            Ok(())
        })?;
        self.persistence.clear()?;
        info!("Project reset");
        Ok(())
    }

    /// Cosmetic resource update; neither persisted nor announced.
    pub fn update_resources(&self, f: impl FnOnce(&mut Resources, &FileSystem, AgentStatus)) {
        let mut state = self.state.write();
        let state = &mut *state;
        f(&mut state.resources, &state.file_system, state.status);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn commit<R>(
        &self,
        scope: Scope,
        persist: bool,
        f: impl FnOnce(&mut ProjectState, &mut Vec<StateEvent>) -> CoreResult<R>,
    ) -> StudioResult<R> {
        let mut state = self.state.write();
        if let Scope::Run(generation) = scope {
            self.check_generation(generation)?;
        }

        let before = Marks::of(&state, self.generation());
        let mut events = Vec::new();
        let result = f(&mut *state, &mut events);

        if result.is_ok() && matches!(scope, Scope::NewGeneration) {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.publish(&state, before, events);

        if result.is_ok() && persist {
            if let Err(e) = self.persistence.save(&state) {
                warn!("Failed to persist state: {}", e);
            }
        }
        Ok(result?)
    }

    fn publish(&self, state: &ProjectState, before: Marks, extra: Vec<StateEvent>) {
        for line in state.terminal_logs.iter().skip(before.log_len) {
            self.emit(StateEvent::LogAppended { line: line.clone() });
        }
        for snapshot in state.history.iter().skip(before.history_len) {
            debug!(label = %snapshot.label, "Snapshot captured");
            self.emit(StateEvent::SnapshotCaptured {
                id: snapshot.id.clone(),
                label: snapshot.label.clone(),
            });
        }
        if state.current_file != before.current_file {
            self.emit(StateEvent::CurrentFileChanged {
                path: state.current_file.clone(),
            });
        }
        for event in extra {
            self.emit(event);
        }

        let generation = self.generation();
        if state.status != before.status || generation != before.generation {
            let tick = StatusTick {
                generation,
                seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
                status: state.status,
            };
            debug!(generation, seq = tick.seq, status = %tick.status, "Status published");
            self.status.send_replace(tick);
            self.emit(StateEvent::StatusChanged {
                generation,
                status: state.status,
            });
        }
    }

    /// Notify status watchers again without publishing a new tick.
    #[cfg(test)]
    pub(crate) fn resend_status(&self) {
        self.status.send_modify(|_| {});
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
