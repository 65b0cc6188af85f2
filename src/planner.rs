//! Stage 1: component planning.
//!
//! Turns a topic (plus optional document context) into the article header
//! and an ordered list of [`ComponentDescriptor`]s, and packages both into
//! the plan manifest the code stage reads.
//!
//! ## Structured output
//!
//! The model is asked for a single JSON object. Replies are often wrapped in
//! prose or markdown fences, so parsing starts from the outermost `{ ... }`
//! span of the reply rather than the whole text. Anything that still fails
//! to deserialize is a [`PlanError::Malformed`]; there is no local retry.
//!
//! ## Bound
//!
//! `max_components` is a hard limit. The prompt asks for fewer, but when the
//! model returns more the list is truncated to the bound and a warning is
//! logged. An empty list is an error: an article with nothing in it is
//! never what the caller wants.

use crate::config::ModelConfig;
use crate::model::prompts;
use crate::model::{ModelBackend, ModelError, ModelRequest};
use crate::types::{ArticleHeader, ComponentDescriptor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Model request failed: {0}")]
    Model(#[from] ModelError),
    #[error("Malformed planner output: {0}")]
    Malformed(String),
    #[error("Planner returned no components")]
    Empty,
    #[error("max_components must be at least 1")]
    InvalidBound,
}

/// Stage 1 output, written to `plan.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanManifest {
    pub topic: String,
    /// Context text the plan was grounded in (empty when none).
    #[serde(default)]
    pub context: String,
    pub max_components: usize,
    pub header: ArticleHeader,
    pub components: Vec<ComponentDescriptor>,
}

#[derive(Deserialize)]
struct OutlineReply {
    components: Vec<ComponentDescriptor>,
}

/// Plan the full article: header first, then the component list.
pub fn plan_article(
    model: &dyn ModelBackend,
    config: &ModelConfig,
    topic: &str,
    context: &str,
    max_components: usize,
) -> Result<PlanManifest, PlanError> {
    if max_components == 0 {
        return Err(PlanError::InvalidBound);
    }
    let header = generate_header(model, config, topic, context)?;
    let components = plan_components(model, config, topic, context, max_components)?;
    Ok(PlanManifest {
        topic: topic.to_string(),
        context: context.to_string(),
        max_components,
        header,
        components,
    })
}

/// Produce the ordered component list for a topic.
///
/// Never returns more than `max_components` entries and never an empty list.
#[tracing::instrument(skip(model, config, context), fields(context_len = context.len()))]
pub fn plan_components(
    model: &dyn ModelBackend,
    config: &ModelConfig,
    topic: &str,
    context: &str,
    max_components: usize,
) -> Result<Vec<ComponentDescriptor>, PlanError> {
    if max_components == 0 {
        return Err(PlanError::InvalidBound);
    }

    let reply = model.complete(&ModelRequest {
        system: prompts::outline_system_prompt(topic, context, max_components),
        user: prompts::OUTLINE_TASK.to_string(),
        max_tokens: config.max_tokens_plan,
        temperature: config.temperature_outline,
    })?;

    let outline: OutlineReply = parse_json_object(&reply)?;
    let mut components = outline.components;

    if components.is_empty() {
        return Err(PlanError::Empty);
    }
    if components.len() > max_components {
        tracing::warn!(
            returned = components.len(),
            max_components,
            "planner exceeded the component bound, truncating"
        );
        components.truncate(max_components);
    }

    tracing::info!(components = components.len(), "planned components");
    Ok(components)
}

/// Produce the article title block.
#[tracing::instrument(skip(model, config, context))]
pub fn generate_header(
    model: &dyn ModelBackend,
    config: &ModelConfig,
    topic: &str,
    context: &str,
) -> Result<ArticleHeader, PlanError> {
    let reply = model.complete(&ModelRequest {
        system: prompts::HEADER_SYSTEM_PROMPT.to_string(),
        user: prompts::header_task(topic, context),
        max_tokens: config.max_tokens_plan,
        temperature: config.temperature_outline,
    })?;
    parse_json_object(&reply)
}

/// Deserialize the outermost JSON object found in a model reply.
fn parse_json_object<T: serde::de::DeserializeOwned>(reply: &str) -> Result<T, PlanError> {
    let json = outermost_object(reply)
        .ok_or_else(|| PlanError::Malformed("reply contains no JSON object".into()))?;
    serde_json::from_str(json).map_err(|e| PlanError::Malformed(e.to_string()))
}

/// The span from the first `{` to the last `}`, if any.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
