//! Manim subprocess renderer.
//!
//! Invocation: `<program> <quality> -v <verbosity> --media_dir <dir> <script> <Scene>`.
//! A fresh process per call; stdout and stderr are drained on helper threads
//! so a chatty renderer can't block on a full pipe while we wait for it.

use super::backend::{RenderError, RenderJob, RenderOutcome, Renderer, failure_diagnostics};
use super::discover;
use crate::config::RendererConfig;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ManimRenderer {
    program: String,
    quality: String,
    verbosity: String,
    media_dir: PathBuf,
    script_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ManimRenderer {
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            program: config.program.clone(),
            quality: config.quality.clone(),
            verbosity: config.verbosity.clone(),
            media_dir: config.media_dir.clone(),
            script_dir: config.script_dir.clone(),
            timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
        }
    }

    /// Full argument list for one job (program excluded).
    pub fn args(&self, job: &RenderJob) -> Vec<String> {
        vec![
            self.quality.clone(),
            "-v".to_string(),
            self.verbosity.clone(),
            "--media_dir".to_string(),
            self.media_dir.to_string_lossy().into_owned(),
            job.script_path.to_string_lossy().into_owned(),
            job.scene.clone(),
        ]
    }

    /// Check that the renderer program can be started (`--version`).
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Renderer for ManimRenderer {
    #[tracing::instrument(skip_all, fields(script = %job.script_path.display(), scene = %job.scene))]
    fn render(&self, job: &RenderJob) -> Result<RenderOutcome, RenderError> {
        let before = discover::snapshot(&self.media_dir);
        let args = self.args(job);
        tracing::debug!(command = %format!("{} {}", self.program, args.join(" ")), "running renderer");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let (status, stdout, stderr) = wait_with_timeout(child, self.timeout)?;

        if !status.success() {
            return Ok(RenderOutcome::Failed {
                diagnostics: failure_diagnostics(&stderr, &stdout, status.code()),
            });
        }

        let after = discover::snapshot(&self.media_dir);
        let created = discover::new_files(&before, &after);
        let stem = job.script_path.file_stem().and_then(|s| s.to_str());
        let output = discover::pick_output(&created, stem);
        tracing::debug!(new_files = created.len(), output = ?output, "render finished");
        Ok(RenderOutcome::Rendered { output })
    }

    fn script_dir(&self) -> &Path {
        &self.script_dir
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            // A read error just truncates diagnostics.
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Wait for the child, killing it once `timeout` elapses.
fn wait_with_timeout(
    mut child: Child,
    timeout: Option<Duration>,
) -> Result<(ExitStatus, String, String), RenderError> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match timeout {
        None => child.wait()?,
        Some(limit) => {
            let started = Instant::now();
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if started.elapsed() >= limit {
                    child.kill()?;
                    child.wait()?;
                    return Err(RenderError::Timeout(limit.as_secs()));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    Ok((status, stdout, stderr))
}
