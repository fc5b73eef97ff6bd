//! The project state aggregate.
//!
//! [`ProjectState`] is the single source of truth for a session. It is a
//! plain value: every mutation goes through one of the methods below, which
//! enforce the stage preconditions, the transition table and the snapshot
//! mode write guard.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::history::HistorySnapshot;
use crate::model::{DesignSystem, FileSystem, Plan, ReviewReport};
use crate::plugin::{default_plugins, NeuralPlugin, PluginResult};
use crate::status::AgentStatus;

/// Synthetic resource metrics shown next to the terminal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Resources {
    /// Percent, 0-100
    pub cpu: f64,
    /// Megabytes
    pub memory: f64,
    /// Kilobytes of file content
    pub vfs_size: f64,
    pub processes: Vec<String>,
}

/// Root aggregate of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectState {
    pub user_prompt: String,
    pub srs: Option<String>,
    pub plan: Option<Plan>,
    pub design_system: Option<DesignSystem>,
    pub file_system: FileSystem,
    pub current_file: Option<String>,
    pub status: AgentStatus,
    pub iteration_count: u32,
    pub terminal_logs: Vec<String>,
    pub resources: Resources,
    pub history: Vec<HistorySnapshot>,
    pub selected_history_id: Option<String>,
    pub active_review: Option<ReviewReport>,
    pub installed_plugins: Vec<NeuralPlugin>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            user_prompt: String::new(),
            srs: None,
            plan: None,
            design_system: None,
            file_system: FileSystem::new(),
            current_file: None,
            status: AgentStatus::Idle,
            iteration_count: 0,
            terminal_logs: Vec::new(),
            resources: Resources::default(),
            history: Vec::new(),
            selected_history_id: None,
            active_review: None,
            installed_plugins: default_plugins(),
        }
    }
}

impl ProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line to the terminal log.
    pub fn log(&mut self, line: impl Into<String>) {
        self.terminal_logs.push(line.into());
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Whether a history snapshot is being displayed instead of live state.
    pub fn is_snapshot_mode(&self) -> bool {
        self.selected_history_id.is_some()
    }

    /// Fail with [`CoreError::SnapshotModeReadOnly`] while in snapshot mode.
    pub fn ensure_live(&self) -> CoreResult<()> {
        if self.is_snapshot_mode() {
            Err(CoreError::SnapshotModeReadOnly)
        } else {
            Ok(())
        }
    }

    /// File system currently on screen: the selected snapshot's or the live one.
    pub fn active_file_system(&self) -> &FileSystem {
        match self.selected_snapshot() {
            Some(snapshot) => &snapshot.file_system,
            None => &self.file_system,
        }
    }

    /// Design system currently on screen.
    pub fn active_design_system(&self) -> Option<&DesignSystem> {
        match self.selected_snapshot() {
            Some(snapshot) => snapshot.design_system.as_ref(),
            None => self.design_system.as_ref(),
        }
    }

    /// Review report currently on screen.
    pub fn active_review_report(&self) -> Option<&ReviewReport> {
        match self.selected_snapshot() {
            Some(snapshot) => snapshot.review_report.as_ref(),
            None => self.active_review.as_ref(),
        }
    }

    /// Summed byte length of every live file.
    pub fn vfs_bytes(&self) -> usize {
        self.file_system.values().map(String::len).sum()
    }

    // =========================================================================
    // Status machine
    // =========================================================================

    /// Data a stage needs before it may be entered.
    pub fn check_preconditions(&self, status: AgentStatus) -> CoreResult<()> {
        let missing = |missing: &'static str| -> CoreResult<()> {
            Err(CoreError::MissingPrecondition { status, missing })
        };

        match status {
            AgentStatus::Managing if self.user_prompt.trim().is_empty() => missing("userPrompt"),
            AgentStatus::Planning if self.srs.is_none() => missing("srs"),
            AgentStatus::Designing | AgentStatus::Architecting if self.plan.is_none() => {
                missing("plan")
            }
            AgentStatus::Coding if self.plan.is_none() => missing("plan"),
            AgentStatus::Coding | AgentStatus::Reviewing if self.design_system.is_none() => {
                missing("designSystem")
            }
            AgentStatus::Reviewing | AgentStatus::Healing if self.file_system.is_empty() => {
                missing("fileSystem")
            }
            _ => Ok(()),
        }
    }

    /// Move to `next` if the transition table and preconditions allow it.
    ///
    /// Entering a milestone status captures a history snapshot labeled with
    /// the milestone name; its id is returned.
    pub fn transition(&mut self, next: AgentStatus) -> CoreResult<Option<String>> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.check_preconditions(next)?;

        debug!(from = %self.status, to = %next, "status transition");
        self.status = next;

        Ok(next
            .milestone_label()
            .map(|label| self.capture_snapshot(label).id.clone()))
    }

    /// Begin a new run for `prompt`.
    ///
    /// Clears the previous run's stage outputs (the file system stays visible
    /// until the architect replaces it) and enters `managing`.
    pub fn start_run(&mut self, prompt: &str) -> CoreResult<Option<String>> {
        if !self.status.can_start_run() {
            return Err(CoreError::RunInProgress(self.status));
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::EmptyPrompt);
        }

        self.user_prompt = prompt.to_string();
        self.srs = None;
        self.plan = None;
        self.design_system = None;
        self.active_review = None;
        self.iteration_count = 0;
        self.selected_history_id = None;
        self.repair_cursor();
        self.log(format!("[system] New run: \"{}\"", prompt));

        self.transition(AgentStatus::Managing)
    }

    /// Halt the run with `status = error`.
    pub fn fail(&mut self, message: impl AsRef<str>) {
        self.log(format!("[error] {}", message.as_ref()));
        self.status = AgentStatus::Error;
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Point the editor at `path`, which must exist in the active file system.
    pub fn set_current_file(&mut self, path: &str) -> CoreResult<()> {
        if !self.active_file_system().contains_key(path) {
            return Err(CoreError::FileNotFound(path.to_string()));
        }
        self.current_file = Some(path.to_string());
        Ok(())
    }

    /// Stage write into the live file system.
    pub fn write_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.file_system.insert(path.into(), content.into());
    }

    /// User edit from the editor; rejected in snapshot mode.
    pub fn edit_file(&mut self, path: &str, content: impl Into<String>) -> CoreResult<()> {
        self.ensure_live()?;
        match self.file_system.get_mut(path) {
            Some(slot) => {
                *slot = content.into();
                Ok(())
            }
            None => Err(CoreError::FileNotFound(path.to_string())),
        }
    }

    /// Replace the live file system with placeholders for every planned file.
    pub fn scaffold_files(&mut self, files: &[String]) {
        self.file_system = files
            .iter()
            .map(|path| (path.clone(), placeholder_content(path)))
            .collect();
        self.current_file = files.first().cloned();
    }

    /// Restore the `currentFile` invariant after the active file system changed.
    pub fn repair_cursor(&mut self) {
        let valid = self
            .current_file
            .as_ref()
            .is_some_and(|path| self.active_file_system().contains_key(path));
        if !valid {
            self.current_file = self.active_file_system().keys().next().cloned();
        }
    }

    /// Overwrite a design token directly (theme editor).
    pub fn update_design_token(&mut self, path: &str, value: &str) -> CoreResult<()> {
        self.ensure_live()?;
        let design = self.design_system.as_mut().ok_or(CoreError::NoDesignSystem)?;
        design.set_token(path, value)?;
        self.log(format!("[theme] {} = {}", path, value));
        Ok(())
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    pub fn find_plugin(&self, id: &str) -> CoreResult<&NeuralPlugin> {
        self.installed_plugins
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::PluginNotFound(id.to_string()))
    }

    /// Flip a plugin's enabled flag, returning the new value.
    pub fn toggle_plugin(&mut self, id: &str) -> CoreResult<bool> {
        self.ensure_live()?;
        let plugin = self
            .installed_plugins
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::PluginNotFound(id.to_string()))?;
        plugin.enabled = !plugin.enabled;
        let (name, enabled) = (plugin.name.clone(), plugin.enabled);
        self.log(format!(
            "[plugin] {} {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        ));
        Ok(enabled)
    }

    /// Add plugins whose id is not installed yet.
    pub fn install_plugins(
        &mut self,
        plugins: impl IntoIterator<Item = NeuralPlugin>,
    ) -> CoreResult<usize> {
        self.ensure_live()?;
        let mut added = 0;
        for plugin in plugins {
            if self.installed_plugins.iter().all(|p| p.id != plugin.id) {
                self.installed_plugins.push(plugin);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Merge a plugin result into live state.
    ///
    /// Mutations overwrite files by path (last writer wins); comments are
    /// appended to the active review, creating an empty one if none exists.
    /// Returns `(mutations applied, comments added)`.
    pub fn apply_plugin_result(
        &mut self,
        plugin: &NeuralPlugin,
        result: PluginResult,
    ) -> (usize, usize) {
        let mutations = result.mutations.len();
        let comments = result.comments.len();

        for mutation in result.mutations {
            if mutation.path.trim().is_empty() {
                continue;
            }
            self.file_system.insert(mutation.path, mutation.content);
        }

        if comments > 0 {
            self.active_review
                .get_or_insert_with(ReviewReport::default)
                .comments
                .extend(result.comments);
        }

        self.log(format!(
            "[plugin] {}: {} file(s) rewritten, {} comment(s)",
            plugin.name, mutations, comments
        ));
        (mutations, comments)
    }
}

fn placeholder_content(path: &str) -> String {
    format!("// {}\n// Awaiting generation by the coder agent...\n", path)
}
