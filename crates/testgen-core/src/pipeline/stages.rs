//! Per-stage work.
//!
//! Each stage reads the context, mutates the run state and reports an
//! outcome; where the run goes next is decided by [`super::next_stage`].
//! Oracle failures never escape a stage: they are logged, recorded on the
//! affected artifact and the stage moves on. Only filesystem errors on the
//! staging and output directories propagate.

use testgen_ci::{failure_excerpt, missing_libraries, CoverageReport};
use tracing::{debug, info, warn};

use crate::domain::{ArtifactStage, GeneratedArtifact};
use crate::error::{Result, TestgenError};
use crate::instructions::InstructionKind;
use crate::obs;
use crate::repair::{decide, repair_request, RepairDecision};
use crate::report;

use super::context::{PipelineContext, PipelineState};
use super::machine::{PipelineStage, StageOutcome};

/// Marker line placed before tests appended for uncovered code.
pub const UNCOVERED_MARKER: &str = "\n// Additional tests for uncovered code\n";

/// Run the work of `stage` against `state`.
pub(crate) async fn execute(
    stage: PipelineStage,
    ctx: &PipelineContext<'_>,
    state: &mut PipelineState,
) -> Result<StageOutcome> {
    match stage {
        PipelineStage::Stage => stage_sources(ctx, state),
        PipelineStage::Refactor => {
            let instruction = ctx.instructions.get(InstructionKind::Refactor).to_string();
            rewrite_each(ctx, state, stage, &instruction, ArtifactStage::Refactored).await
        }
        PipelineStage::Generate => generate(ctx, state).await,
        PipelineStage::DedupOracle => {
            let instruction = ctx.instructions.get(InstructionKind::Deduplicate).to_string();
            rewrite_each(ctx, state, stage, &instruction, ArtifactStage::OracleDeduplicated).await
        }
        PipelineStage::DedupMechanical => dedupe_each(ctx, state),
        PipelineStage::BuildVerify => build_verify(ctx, state).await,
        PipelineStage::LibraryFix => library_fix(ctx, state).await,
        PipelineStage::Coverage => coverage(ctx, state).await,
        PipelineStage::RefineWithCoverage => {
            let instruction = with_coverage(
                ctx.instructions.get(InstructionKind::FinalRefinement),
                state.coverage_summary(),
            );
            rewrite_each(ctx, state, stage, &instruction, ArtifactStage::Refined).await
        }
        PipelineStage::AugmentUncovered => augment_uncovered(ctx, state).await,
        PipelineStage::Report => {
            report::write_reports(ctx, state)?;
            Ok(StageOutcome::Completed)
        }
        PipelineStage::Done | PipelineStage::Aborted => Ok(StageOutcome::Skipped),
    }
}

fn with_coverage(instruction: &str, coverage: &str) -> String {
    format!("{instruction}\n\nCoverage Report:\n{coverage}")
}

fn tally(succeeded: usize, total: usize) -> StageOutcome {
    if total == 0 {
        StageOutcome::Skipped
    } else if succeeded == total {
        StageOutcome::Completed
    } else {
        StageOutcome::Degraded
    }
}

/// Ask the oracle and normalize its answer.
///
/// Returns `(raw, normalized)`, or the failure message after logging it. An
/// answer that normalizes to nothing counts as a failure.
async fn consult(
    ctx: &PipelineContext<'_>,
    stage: PipelineStage,
    target: &str,
    input: &str,
    instruction: &str,
) -> std::result::Result<(String, String), String> {
    match ctx.oracle.transform(input, instruction).await {
        Ok(raw) => {
            let code = ctx.normalizer.normalize(&raw);
            if code.is_empty() {
                let message = "oracle returned no code".to_string();
                obs::emit_oracle_failed(stage, target, "empty", &message);
                return Err(message);
            }
            Ok((raw, code))
        }
        Err(e) => {
            obs::emit_oracle_failed(stage, target, e.kind(), &e);
            Err(e.to_string())
        }
    }
}

fn store(
    ctx: &PipelineContext<'_>,
    artifact: &mut GeneratedArtifact,
    stage: ArtifactStage,
    raw: String,
    code: String,
) -> Result<()> {
    ctx.staging.write(&artifact.path, &code)?;
    artifact.accept(stage, raw, code);
    Ok(())
}

fn stage_sources(ctx: &PipelineContext<'_>, state: &mut PipelineState) -> Result<StageOutcome> {
    ctx.staging.prepare()?;
    for unit in &ctx.units {
        let path = ctx.staging.artifact_path(unit);
        ctx.staging.write(&path, &unit.content)?;
        info!(source = %unit.path.display(), replica = %path.display(), "created replica");
        state
            .artifacts
            .insert(unit.path.clone(), GeneratedArtifact::staged(unit, path));
    }
    Ok(tally(state.artifacts.len(), ctx.units.len()))
}

/// Send every artifact through the oracle with one instruction.
async fn rewrite_each(
    ctx: &PipelineContext<'_>,
    state: &mut PipelineState,
    stage: PipelineStage,
    instruction: &str,
    next: ArtifactStage,
) -> Result<StageOutcome> {
    let total = state.artifacts.len();
    let mut succeeded = 0;
    for artifact in state.artifacts.values_mut() {
        let name = artifact.file_name();
        match consult(ctx, stage, &name, &artifact.code, instruction).await {
            Ok((raw, code)) => {
                store(ctx, artifact, next, raw, code)?;
                succeeded += 1;
                info!(artifact = %name, stage = stage.name(), "artifact updated");
            }
            Err(message) => {
                artifact.record_failure(message);
                state.oracle_failures += 1;
            }
        }
    }
    Ok(tally(succeeded, total))
}

async fn generate(ctx: &PipelineContext<'_>, state: &mut PipelineState) -> Result<StageOutcome> {
    let instruction = ctx.instructions.get(InstructionKind::Initial);
    for unit in &ctx.units {
        let Some(artifact) = state.artifacts.get_mut(&unit.path) else {
            continue;
        };
        let name = unit.file_name();
        info!(source = %name, "generating tests");
        match consult(ctx, PipelineStage::Generate, &name, &unit.content, instruction).await {
            Ok((raw, code)) => {
                store(ctx, artifact, ArtifactStage::Generated, raw, code)?;
                state.generated += 1;
            }
            Err(message) => {
                warn!(source = %name, "could not generate tests");
                artifact.record_failure(message);
                state.oracle_failures += 1;
            }
        }
    }

    info!(
        generated = state.generated,
        attempted = ctx.units.len(),
        "initial generation finished"
    );
    if state.generated == 0 {
        return Ok(StageOutcome::NothingGenerated);
    }
    Ok(tally(state.generated, ctx.units.len()))
}

fn dedupe_each(ctx: &PipelineContext<'_>, state: &mut PipelineState) -> Result<StageOutcome> {
    for artifact in state.artifacts.values_mut() {
        let deduped = ctx.deduplicator.dedupe(&artifact.code);
        if deduped == artifact.code {
            continue;
        }
        ctx.staging.write(&artifact.path, &deduped)?;
        debug!(
            artifact = %artifact.file_name(),
            removed_bytes = artifact.code.len().saturating_sub(deduped.len()),
            "duplicate test cases removed"
        );
        artifact.rewrite(ArtifactStage::Deduplicated, deduped);
    }
    Ok(StageOutcome::Completed)
}

async fn build_verify(ctx: &PipelineContext<'_>, state: &mut PipelineState) -> Result<StageOutcome> {
    let instruction = ctx.instructions.get(InstructionKind::FixBuild);
    let max_builds = ctx.policy.max_builds();

    loop {
        let attempt_no = state.build_attempts.len() as u32 + 1;
        let build = ctx.build.build_and_test(attempt_no).await;
        obs::emit_build_attempt(attempt_no, max_builds, build.success);
        let decision = decide(&build, state.repairs_used, &ctx.policy);
        let log = build.log.clone();
        state.build_attempts.push(build);

        match decision {
            RepairDecision::Verified => {
                info!(attempts = attempt_no, "build passed");
                state.build_verified = true;
                return Ok(StageOutcome::BuildVerified);
            }
            RepairDecision::Exhausted { repairs } => {
                warn!(
                    repairs,
                    error = failure_excerpt(&log).unwrap_or("unknown"),
                    "build still failing after all repairs, continuing without a verified build"
                );
                return Ok(StageOutcome::BuildUnverified);
            }
            RepairDecision::Repair { attempt } => {
                info!(attempt, max = ctx.policy.max_attempts, "build failed, requesting repair");
                state.repairs_used = attempt;
                let request = repair_request(state.artifacts.values().map(|a| a.code.as_str()), &log);
                match consult(ctx, PipelineStage::BuildVerify, "all artifacts", &request, instruction)
                    .await
                {
                    Ok((raw, code)) => {
                        obs::emit_broadcast_overwrite(state.artifacts.len(), attempt);
                        for artifact in state.artifacts.values_mut() {
                            store(ctx, artifact, ArtifactStage::Repaired, raw.clone(), code.clone())?;
                        }
                    }
                    Err(message) => {
                        state.oracle_failures += 1;
                        for artifact in state.artifacts.values_mut() {
                            artifact.record_failure(message.clone());
                        }
                    }
                }
            }
        }
    }
}

async fn library_fix(ctx: &PipelineContext<'_>, state: &mut PipelineState) -> Result<StageOutcome> {
    let log = state
        .last_build()
        .map(|b| b.log.clone())
        .unwrap_or_default();
    let instruction = format!(
        "{}\n\nBuild Log:\n{}",
        ctx.instructions.get(InstructionKind::AddLibraries),
        log
    );
    let outcome = rewrite_each(
        ctx,
        state,
        PipelineStage::LibraryFix,
        &instruction,
        ArtifactStage::LibrariesAdded,
    )
    .await?;

    let missing = missing_libraries(&log);
    for library in &missing {
        obs::emit_missing_library(&library.name, &library.advisory());
    }
    state.advisories = missing;
    Ok(outcome)
}

async fn coverage(ctx: &PipelineContext<'_>, state: &mut PipelineState) -> Result<StageOutcome> {
    let (report, outcome) = if state.build_verified {
        let files: Vec<_> = ctx.units.iter().map(|u| u.path.clone()).collect();
        (ctx.coverage.collect(&files).await, StageOutcome::Completed)
    } else {
        warn!("skipping coverage analysis because the build never passed");
        (CoverageReport::placeholder(), StageOutcome::Degraded)
    };

    let output_dir = &ctx.config.output_dir;
    report
        .write_to(output_dir)
        .map_err(|e| TestgenError::file_io(output_dir, e))?;
    state.coverage = Some(report);
    Ok(outcome)
}

async fn augment_uncovered(
    ctx: &PipelineContext<'_>,
    state: &mut PipelineState,
) -> Result<StageOutcome> {
    let instruction = with_coverage(
        ctx.instructions.get(InstructionKind::Uncovered),
        state.coverage_summary(),
    );
    let total = state.artifacts.len();
    let mut succeeded = 0;
    for artifact in state.artifacts.values_mut() {
        let name = artifact.file_name();
        match consult(ctx, PipelineStage::AugmentUncovered, &name, &artifact.code, &instruction).await
        {
            Ok((raw, extra)) => {
                let combined = format!("{}{}{}", artifact.code, UNCOVERED_MARKER, extra);
                store(ctx, artifact, ArtifactStage::Augmented, raw, combined)?;
                succeeded += 1;
                info!(artifact = %name, "added tests for uncovered code");
            }
            Err(message) => {
                artifact.record_failure(message);
                state.oracle_failures += 1;
            }
        }
    }
    Ok(tally(succeeded, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally() {
        assert_eq!(tally(0, 0), StageOutcome::Skipped);
        assert_eq!(tally(2, 2), StageOutcome::Completed);
        assert_eq!(tally(1, 2), StageOutcome::Degraded);
        assert_eq!(tally(0, 2), StageOutcome::Degraded);
    }

    #[test]
    fn test_with_coverage_layout() {
        assert_eq!(
            with_coverage("Refine.", "Lines executed:50.00%"),
            "Refine.\n\nCoverage Report:\nLines executed:50.00%"
        );
    }
}
