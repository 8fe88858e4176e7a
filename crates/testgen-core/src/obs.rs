//! Structured lifecycle events for pipeline runs.
//!
//! Every event carries an `event` field so JSON log consumers can filter on
//! it; all of them are emitted inside the run span created by [`run_span`].

use tracing::{info, warn};

use crate::pipeline::{PipelineStage, StageOutcome};

/// Span grouping every event of one run.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("testgen.run", run_id = %run_id)
}

pub fn emit_run_started(run_id: &str, project: &str, sources: usize) {
    info!(event = "run.started", run_id = %run_id, project = %project, sources);
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, build_verified: bool, aborted: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms,
        build_verified,
        aborted,
    );
}

/// Console banner plus structured start event.
pub fn emit_stage_started(stage: PipelineStage) {
    info!("{}", "=".repeat(40));
    info!("STEP {}: {}", stage.step_number(), stage.title());
    info!("{}", "=".repeat(40));
    info!(event = "stage.started", stage = stage.name());
}

pub fn emit_stage_finished(stage: PipelineStage, outcome: StageOutcome, duration_ms: u64) {
    info!(
        event = "stage.finished",
        stage = stage.name(),
        outcome = outcome.name(),
        duration_ms,
    );
}

pub fn emit_build_attempt(attempt: u32, max_builds: u32, success: bool) {
    info!(event = "build.attempt", attempt, max_builds, success);
}

pub fn emit_oracle_failed(stage: PipelineStage, artifact: &str, kind: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "oracle.failed",
        stage = stage.name(),
        artifact = %artifact,
        kind = %kind,
        error = %error,
    );
}

/// The repair response is being written over every artifact at once.
pub fn emit_broadcast_overwrite(artifacts: usize, repair_attempt: u32) {
    warn!(
        event = "repair.broadcast_overwrite",
        artifacts,
        repair_attempt,
        "overwriting every artifact with a single repair response; per-file content is lost"
    );
}

pub fn emit_missing_library(library: &str, advisory: &str) {
    warn!(event = "build.missing_library", library = %library, "{}", advisory);
}
