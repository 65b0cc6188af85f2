//! Stage 2: fan-out/fan-in over component pipelines.
//!
//! Every descriptor gets its own [`run_component`] call on a rayon pool.
//! Results come back tagged with their original index and are merged by that
//! index, so the artifact list always has the same length and order as the
//! descriptor list no matter which pipeline finished first.
//!
//! A pipeline that hits a hard model failure does not cancel its siblings.
//! All pipelines run to completion; afterwards the failure with the lowest
//! index is returned. Validation failures are not failures at this level:
//! they are visible only in the [`PipelineReport`]s.

use crate::pipeline::{PipelineContext, PipelineError, run_component};
use crate::planner::PlanManifest;
use crate::types::{
    ArticleAssembly, ArticleHeader, CodedArtifact, ComponentDescriptor, PipelineReport,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Component {index} failed: {source}")]
    Component {
        index: usize,
        #[source]
        source: PipelineError,
    },
    #[error("Could not build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Artifacts plus per-component reports, both in descriptor order.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub artifacts: Vec<CodedArtifact>,
    pub reports: Vec<PipelineReport>,
}

/// Stage 2 output, written to `coded.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodedManifest {
    pub topic: String,
    pub header: ArticleHeader,
    pub artifacts: Vec<CodedArtifact>,
    #[serde(default)]
    pub reports: Vec<PipelineReport>,
}

impl CodedManifest {
    pub fn assembly(&self) -> ArticleAssembly {
        ArticleAssembly {
            header: self.header.clone(),
            artifacts: self.artifacts.clone(),
        }
    }
}

/// Run all pipelines and return the artifacts in descriptor order.
pub fn dispatch(
    ctx: &PipelineContext<'_>,
    descriptors: &[ComponentDescriptor],
    workers: usize,
) -> Result<Vec<CodedArtifact>, CoordinatorError> {
    Ok(dispatch_with_reports(ctx, descriptors, workers)?.artifacts)
}

/// Run all pipelines on a pool of `workers` threads, keeping the reports.
pub fn dispatch_with_reports(
    ctx: &PipelineContext<'_>,
    descriptors: &[ComponentDescriptor],
    workers: usize,
) -> Result<DispatchResult, CoordinatorError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    tracing::info!(components = descriptors.len(), workers, "dispatching pipelines");

    let results: Vec<(usize, Result<(CodedArtifact, PipelineReport), PipelineError>)> = pool
        .install(|| {
            descriptors
                .par_iter()
                .enumerate()
                .map(|(index, descriptor)| (index, run_component(ctx, index, descriptor)))
                .collect()
        });

    merge(results)
}

/// Fan-in: order by original index, surface the first hard failure.
fn merge(
    mut results: Vec<(usize, Result<(CodedArtifact, PipelineReport), PipelineError>)>,
) -> Result<DispatchResult, CoordinatorError> {
    results.sort_by_key(|(index, _)| *index);

    let mut artifacts = Vec::with_capacity(results.len());
    let mut reports = Vec::with_capacity(results.len());
    for (index, result) in results {
        match result {
            Ok((artifact, report)) => {
                artifacts.push(artifact);
                reports.push(report);
            }
            Err(source) => return Err(CoordinatorError::Component { index, source }),
        }
    }
    Ok(DispatchResult { artifacts, reports })
}

/// Run stage 2 for a plan manifest.
pub fn code_article(
    ctx: &PipelineContext<'_>,
    plan: &PlanManifest,
    workers: usize,
) -> Result<CodedManifest, CoordinatorError> {
    let result = dispatch_with_reports(ctx, &plan.components, workers)?;
    let failed = result.reports.iter().filter(|r| !r.succeeded).count();
    tracing::info!(
        artifacts = result.artifacts.len(),
        failed,
        "all pipelines finished"
    );
    Ok(CodedManifest {
        topic: plan.topic.clone(),
        header: plan.header.clone(),
        artifacts: result.artifacts,
        reports: result.reports,
    })
}
