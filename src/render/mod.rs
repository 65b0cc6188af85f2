//! Rendering generated scripts with the external tool.
//!
//! | Operation | Where |
//! |---|---|
//! | **Extract** script from model output | [`extract::extract_script`] |
//! | **Detect** scene class | [`extract::detect_scene_name`] |
//! | **Stage** script to a uniquely named file | [`stage_script`] |
//! | **Render** via subprocess | [`ManimRenderer`] ([`Renderer`] trait) |
//! | **Discover** the produced media file | [`discover`] |

pub mod backend;
pub mod discover;
pub mod extract;
pub mod manim;

pub use backend::{RenderError, RenderJob, RenderOutcome, Renderer};
pub use extract::{DEFAULT_SCENE, detect_scene_name, extract_script};
pub use manim::ManimRenderer;

use crate::naming;
use std::fs;

/// Write an already-extracted script to a fresh file in the renderer's
/// script directory and build the job for it.
///
/// Every call gets a new file name, so concurrent pipelines never share a
/// script. Files are left in place after rendering.
pub fn stage_script(renderer: &dyn Renderer, script: &str) -> std::io::Result<RenderJob> {
    let dir = renderer.script_dir();
    fs::create_dir_all(dir)?;
    let script_path = dir.join(naming::script_filename());
    fs::write(&script_path, script)?;
    tracing::debug!(path = %script_path.display(), "saved script");
    Ok(RenderJob {
        script_path,
        scene: detect_scene_name(script).to_string(),
    })
}
