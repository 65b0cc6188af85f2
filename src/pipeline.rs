//! Per-component code pipeline.
//!
//! Each visual component runs through a small state machine that turns its
//! description into a script the renderer accepts:
//!
//! ```text
//! Start ──text──▶ TextShortCircuit (terminal)
//!   │
//!   └─visual──▶ Plan ──▶ Execute ──▶ Validate ──▶ Finish (terminal)
//!                          ▲            │
//!                          └──retry─────┘   error && attempts < max_attempts
//! ```
//!
//! - **Plan** asks the model for a rendering plan using the image or video
//!   system prompt.
//! - **Execute** asks for code. The first attempt sees only the plan; repair
//!   attempts also see the previous code and the renderer's error.
//! - **Validate** extracts the script, writes it to a fresh file, runs the
//!   renderer and records the result. `attempts` counts Validate runs.
//! - **Finish** builds the artifact from the original description and
//!   caption plus the last code, whether or not the last validation passed.
//!
//! Validation failures never leave the pipeline as errors; they feed the
//! retry loop and end up in the [`PipelineReport`]. Only model failures are
//! returned as [`PipelineError`].
//!
//! [`PipelineState`] is owned by one run and never shared. The only state
//! pipelines share is the render cache, behind a `Mutex`.

use crate::cache::RenderCache;
use crate::config::ModelConfig;
use crate::model::prompts;
use crate::model::{ModelBackend, ModelError, ModelRequest};
use crate::render::{self, RenderOutcome, Renderer, extract};
use crate::types::{CodedArtifact, ComponentDescriptor, ComponentKind, PipelineReport};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Model request failed: {0}")]
    Model(#[from] ModelError),
}

/// Shared collaborators for pipeline runs.
///
/// Borrowed by every pipeline of an article, so everything in here is `Sync`.
pub struct PipelineContext<'a> {
    pub model: &'a dyn ModelBackend,
    pub renderer: &'a dyn Renderer,
    pub cache: &'a Mutex<RenderCache>,
    pub model_config: &'a ModelConfig,
    /// Cap on Validate runs per component.
    pub max_attempts: u32,
    /// Progress events for the CLI, if anyone listens.
    pub events: Option<Sender<PipelineEvent>>,
}

impl PipelineContext<'_> {
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            // A closed channel only means nobody prints progress any more.
            tx.send(event).ok();
        }
    }
}

/// Mutable record for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub descriptor: ComponentDescriptor,
    pub plan: String,
    pub code: String,
    /// Last validation error; `None` after a passing validation.
    pub error: Option<String>,
    pub attempts: u32,
}

impl PipelineState {
    pub fn new(descriptor: ComponentDescriptor) -> Self {
        Self {
            descriptor,
            plan: String::new(),
            code: String::new(),
            error: None,
            attempts: 0,
        }
    }
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    TextShortCircuit,
    Plan,
    Execute,
    Validate,
    Finish,
}

/// Progress reported while pipelines run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started {
        index: usize,
        kind: ComponentKind,
        summary: String,
    },
    Planned {
        index: usize,
    },
    /// Validation of one attempt failed (another attempt may follow).
    AttemptFailed {
        index: usize,
        attempt: u32,
        error: String,
    },
    Finished {
        report: PipelineReport,
    },
}

/// Drive one descriptor through the state machine.
///
/// `index` is the component's position in the article; it is only used for
/// the report and progress events.
#[tracing::instrument(skip_all, fields(index = index, kind = %descriptor.kind()))]
pub fn run_component(
    ctx: &PipelineContext<'_>,
    index: usize,
    descriptor: &ComponentDescriptor,
) -> Result<(CodedArtifact, PipelineReport), PipelineError> {
    ctx.emit(PipelineEvent::Started {
        index,
        kind: descriptor.kind(),
        summary: descriptor.summary().to_string(),
    });

    let mut state = PipelineState::new(descriptor.clone());
    let mut stage = Stage::Start;

    loop {
        tracing::debug!(?stage, attempts = state.attempts, "pipeline stage");
        stage = match stage {
            Stage::Start => route(&state.descriptor),
            Stage::TextShortCircuit | Stage::Finish => break,
            Stage::Plan => {
                state.plan = plan_step(ctx, &state.descriptor)?;
                ctx.emit(PipelineEvent::Planned { index });
                Stage::Execute
            }
            Stage::Execute => {
                execute_step(ctx, &mut state)?;
                Stage::Validate
            }
            Stage::Validate => {
                validate_step(ctx, &mut state);
                if let Some(error) = &state.error {
                    ctx.emit(PipelineEvent::AttemptFailed {
                        index,
                        attempt: state.attempts,
                        error: error.clone(),
                    });
                }
                next_after_validate(&state, ctx.max_attempts)
            }
        };
    }

    let (artifact, report) = finish(state, index);
    if !report.succeeded {
        tracing::warn!(
            attempts = report.attempts,
            error = report.last_error.as_deref().unwrap_or_default(),
            "retries exhausted, keeping last generated code"
        );
    }
    ctx.emit(PipelineEvent::Finished {
        report: report.clone(),
    });
    Ok((artifact, report))
}

/// Start: text goes straight to the terminal, visuals get planned.
pub fn route(descriptor: &ComponentDescriptor) -> Stage {
    match descriptor {
        ComponentDescriptor::Text { .. } => Stage::TextShortCircuit,
        ComponentDescriptor::Image { .. } | ComponentDescriptor::Video { .. } => Stage::Plan,
    }
}

/// Retry while the last validation failed and attempts remain.
pub fn next_after_validate(state: &PipelineState, max_attempts: u32) -> Stage {
    if state.error.is_some() && state.attempts < max_attempts {
        Stage::Execute
    } else {
        Stage::Finish
    }
}

fn plan_step(
    ctx: &PipelineContext<'_>,
    descriptor: &ComponentDescriptor,
) -> Result<String, ModelError> {
    let (system, user) = match descriptor {
        ComponentDescriptor::Image { description, .. } => (
            prompts::PLAN_IMAGE_SYSTEM_PROMPT,
            prompts::plan_image_task(description),
        ),
        ComponentDescriptor::Video { description, .. } => (
            prompts::PLAN_VIDEO_SYSTEM_PROMPT,
            prompts::plan_video_task(description),
        ),
        ComponentDescriptor::Text { text } => return Ok(text.clone()),
    };
    ctx.model.complete(&ModelRequest {
        system: system.to_string(),
        user,
        max_tokens: ctx.model_config.max_tokens_plan,
        temperature: ctx.model_config.temperature_plan,
    })
}

fn execute_step(ctx: &PipelineContext<'_>, state: &mut PipelineState) -> Result<(), ModelError> {
    let system = match state.descriptor.kind() {
        ComponentKind::Video => prompts::EXECUTE_VIDEO_SYSTEM_PROMPT,
        ComponentKind::Image | ComponentKind::Text => prompts::EXECUTE_IMAGE_SYSTEM_PROMPT,
    };
    let user = match (&state.error, state.attempts) {
        (Some(error), n) if n > 0 => prompts::repair_code_task(&state.code, error, &state.plan),
        _ => prompts::generate_code_task(&state.plan),
    };
    state.code = ctx.model.complete(&ModelRequest {
        system: system.to_string(),
        user,
        max_tokens: ctx.model_config.max_tokens_code,
        temperature: ctx.model_config.temperature_code,
    })?;
    state.error = None;
    Ok(())
}

fn validate_step(ctx: &PipelineContext<'_>, state: &mut PipelineState) {
    state.attempts += 1;

    let Some(script) = extract::extract_script(&state.code) else {
        state.error = Some(extract::missing_marker_message());
        return;
    };

    let job = match render::stage_script(ctx.renderer, &script) {
        Ok(job) => job,
        Err(e) => {
            state.error = Some(format!("Could not save script: {e}"));
            return;
        }
    };

    state.error = match ctx.renderer.render(&job) {
        Ok(RenderOutcome::Rendered { output }) => {
            if let Some(path) = output {
                ctx.cache
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(&script, path);
            }
            None
        }
        Ok(RenderOutcome::Failed { diagnostics }) if diagnostics.trim().is_empty() => {
            Some("Renderer failed without diagnostics".to_string())
        }
        Ok(RenderOutcome::Failed { diagnostics }) => Some(diagnostics),
        Err(e) => Some(e.to_string()),
    };
}

/// Terminal: build the artifact and the report.
///
/// Visual artifacts carry the extracted script when extraction works, so the
/// code manifest holds runnable files; otherwise the raw model reply.
fn finish(state: PipelineState, index: usize) -> (CodedArtifact, PipelineReport) {
    let kind = state.descriptor.kind();
    let code = extract::extract_script(&state.code).unwrap_or(state.code);
    let artifact = match state.descriptor {
        ComponentDescriptor::Text { text } => CodedArtifact::Text { text },
        ComponentDescriptor::Image {
            description,
            caption,
        } => CodedArtifact::Image {
            description,
            caption,
            code,
        },
        ComponentDescriptor::Video {
            description,
            caption,
            ..
        } => CodedArtifact::Video {
            description,
            caption,
            code,
        },
    };
    let report = PipelineReport {
        index,
        kind,
        attempts: state.attempts,
        succeeded: state.error.is_none(),
        last_error: state.error,
    };
    (artifact, report)
}
