//! # Explainer
//!
//! Generates illustrated educational articles from a topic prompt: markdown
//! prose with LaTeX, static Manim diagrams and short Manim animations, all
//! embedded in a single HTML file.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! Explainer processes an article through three independent stages, each
//! producing a file the next stage consumes:
//!
//! ```text
//! 1. Plan      topic (+context)  →  plan.json      (header + ordered component descriptors)
//! 2. Code      plan.json         →  coded.json     (ordered artifacts with validated scripts)
//! 3. Assemble  coded.json        →  article.html   (rendered media embedded inline)
//! ```
//!
//! This separation exists for three reasons:
//!
//! - **Debuggability**: each manifest is human-readable JSON you can inspect
//!   and edit (re-plan a caption, hand-fix a script) before the next stage.
//! - **Cost control**: model calls happen in stages 1 and 2 only. Re-assembling
//!   after a style change costs nothing.
//! - **Testability**: the model and the renderer sit behind traits, so every
//!   stage runs in unit tests against scripted backends.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`planner`] | Stage 1 — topic → header and ordered component descriptors |
//! | [`pipeline`] | Per-component state machine: plan → code → render → repair |
//! | [`coordinator`] | Stage 2 — parallel fan-out of pipelines, ordered fan-in |
//! | [`assemble`] | Stage 3 — renders the final HTML page using Maud |
//! | [`model`] | `ModelBackend` trait, Anthropic client, prompt text |
//! | [`render`] | `Renderer` trait, Manim subprocess, script extraction, output discovery |
//! | [`cache`] | Content-addressed render cache shared by stages 2 and 3 |
//! | [`context`] | Document page extractions → planner context |
//! | [`config`] | `explainer.toml` loading, validation and merging |
//! | [`types`] | Shared types serialized between stages |
//! | [`naming`] | Script and article file names |
//! | [`output`] | CLI output formatting for every stage |
//!
//! # Design Decisions
//!
//! ## Validate By Rendering
//!
//! A generated script is only accepted once the renderer has actually run it.
//! When it fails, the renderer's own error text goes back to the model with
//! the previous code and the original plan. A bounded number of attempts
//! (three by default) keeps a hopeless component from stalling the article;
//! the last code is kept either way and the outcome is recorded in a
//! [`types::PipelineReport`].
//!
//! ## Closed Component Types
//!
//! Descriptors and artifacts are closed enums ([`types::ComponentDescriptor`],
//! [`types::CodedArtifact`]). Text never enters the code pipeline; every
//! consumer matches all variants, so adding a kind is a compile error until
//! every stage handles it.
//!
//! ## Plain Threads, No Workflow Engine
//!
//! Components are independent, so stage 2 is a rayon parallel map over
//! `(index, descriptor)` with results merged by index. The model client is
//! blocking and the renderer is a subprocess; neither needs an async runtime.
//!
//! ## Self-Contained Output
//!
//! Media are embedded as base64 data URIs and the stylesheet is inlined, so
//! the article is one file that can be mailed, uploaded or opened offline.
//! Only math typesetting (KaTeX) is fetched from a CDN.

pub mod assemble;
pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod model;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
