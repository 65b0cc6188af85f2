//! Renderer backend trait and shared types.
//!
//! The [`Renderer`] trait runs one script file through the external rendering
//! tool. The production implementation is
//! [`ManimRenderer`](super::manim::ManimRenderer), a subprocess per call.
//!
//! A tool that ran and rejected the script is a normal
//! [`RenderOutcome::Failed`] carrying its diagnostics; [`RenderError`] is for
//! the tool not running at all (missing binary, I/O, timeout).

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to start renderer '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Renderer timed out after {0}s")]
    Timeout(u64),
    #[error("Renderer ran successfully but produced no output files")]
    NoOutput,
}

/// One render request: a script on disk and the scene class inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub script_path: PathBuf,
    pub scene: String,
}

/// Result of a renderer run that actually executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Exit status 0. `output` is the discovered media file, if any.
    Rendered { output: Option<PathBuf> },
    /// Nonzero exit with the tool's diagnostics.
    Failed { diagnostics: String },
}

/// Trait for rendering backends.
///
/// `Sync` because pipelines render from rayon workers.
pub trait Renderer: Sync {
    /// Render one script.
    fn render(&self, job: &RenderJob) -> Result<RenderOutcome, RenderError>;

    /// Directory generated scripts are written to.
    fn script_dir(&self) -> &Path;
}

/// Pick diagnostics for a failed run: stderr, else stdout, else a generic
/// message naming the exit code.
pub fn failure_diagnostics(stderr: &str, stdout: &str, code: Option<i32>) -> String {
    if !stderr.trim().is_empty() {
        stderr.to_string()
    } else if !stdout.trim().is_empty() {
        stdout.to_string()
    } else {
        match code {
            Some(c) => format!("Renderer exited with status {c} and no output"),
            None => "Renderer was terminated by a signal and produced no output".to_string(),
        }
    }
}
