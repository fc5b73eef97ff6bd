//! # neural_agents
//!
//! Stage agents for NeuralStudio.
//!
//! Every pipeline stage (manager, planner, designer, coder, reviewer,
//! patcher) and plugin invocation goes through the [`StageClient`] trait.
//! Two implementations ship here:
//!
//! - [`LlmStageClient`]: renders prompts, calls a [`CompletionBackend`]
//!   (the HTTP [`LlmAdapter`] in production) and parses the answer under a
//!   [`ParsePolicy`]
//! - [`MockStageClient`]: deterministic, recording, no network

pub mod client;
pub mod error;
pub mod llm;
pub mod llm_client;
pub mod mock;
pub mod parse;
pub mod prompts;
pub mod roles;

pub use client::StageClient;
pub use error::{AgentError, AgentResult};
pub use llm::{
    CompletionBackend, CompletionRequest, LlmAdapter, LlmProvider, LlmResponse, LlmSettings,
};
pub use llm_client::LlmStageClient;
pub use mock::{CapturedCall, MockStageClient, ScriptedBackend};
pub use parse::{extract_json, parse_structured, parse_text, strip_code_fences, ParsePolicy, Parsed};
pub use roles::AgentRole;
