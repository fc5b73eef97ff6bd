//! # neural_core
//!
//! State model for NeuralStudio.
//!
//! This crate holds the single source of truth of a session and the rules
//! that govern how it may change. It performs no I/O and knows nothing
//! about LLMs; the orchestrator in `neural_studio` drives it.
//!
//! # Architecture
//!
//! - **ProjectState**: prompt, stage outputs, virtual file system, logs, plugins
//! - **AgentStatus**: the stage enum and its transition table
//! - **History**: append-only deep-copied snapshots, selection and rollback
//! - **Plugins**: registry types and result merge rules
//! - **Resources**: cosmetic CPU/memory/VFS simulation
//!
//! # Example
//!
//! ```rust
//! use neural_core::{AgentStatus, ProjectState};
//!
//! let mut state = ProjectState::new();
//! state.start_run("todo app").unwrap();
//! assert_eq!(state.status, AgentStatus::Managing);
//! assert_eq!(state.history.len(), 1);
//! ```

pub mod error;
pub mod history;
pub mod model;
pub mod plugin;
pub mod resources;
pub mod state;
pub mod status;

pub use error::{CoreError, CoreResult};
pub use history::HistorySnapshot;
pub use model::{
    app_name_from_prompt, ColorTokens, DesignMetadata, DesignSystem, FileSystem, LayoutTokens,
    Plan, ReviewComment, ReviewReport, Severity, TypographyTokens, REQUIRED_FILES,
};
pub use plugin::{default_plugins, FileMutation, NeuralPlugin, PluginHook, PluginResult};
pub use resources::{processes_for, ResourceSimulator, SimulatorConfig};
pub use state::{ProjectState, Resources};
pub use status::AgentStatus;
