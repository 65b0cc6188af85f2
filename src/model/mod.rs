//! Generative model access.
//!
//! | Piece | Role |
//! |---|---|
//! | **Backend** | [`ModelBackend`] trait: one system + user message in, text out |
//! | **Anthropic** | [`AnthropicBackend`], blocking Messages API client |
//! | **Prompts** | System prompts and task templates for every call site |
//!
//! Everything upstream (planner, pipeline) talks to `&dyn ModelBackend`, so
//! tests drive the whole workflow with a scripted backend.

pub mod anthropic;
pub mod backend;
pub mod prompts;

pub use anthropic::AnthropicBackend;
pub use backend::{ModelBackend, ModelError, ModelRequest};
