//! Pipeline stages and the transitions between them.

use serde::{Deserialize, Serialize};

/// Every state a run can be in, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Stage,
    Refactor,
    Generate,
    DedupOracle,
    DedupMechanical,
    BuildVerify,
    LibraryFix,
    Coverage,
    RefineWithCoverage,
    AugmentUncovered,
    Report,
    Done,
    Aborted,
}

impl PipelineStage {
    /// Stages that do work, in order.
    pub const WORK: [PipelineStage; 11] = [
        PipelineStage::Stage,
        PipelineStage::Refactor,
        PipelineStage::Generate,
        PipelineStage::DedupOracle,
        PipelineStage::DedupMechanical,
        PipelineStage::BuildVerify,
        PipelineStage::LibraryFix,
        PipelineStage::Coverage,
        PipelineStage::RefineWithCoverage,
        PipelineStage::AugmentUncovered,
        PipelineStage::Report,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Stage => "stage",
            PipelineStage::Refactor => "refactor",
            PipelineStage::Generate => "generate",
            PipelineStage::DedupOracle => "dedup_oracle",
            PipelineStage::DedupMechanical => "dedup_mechanical",
            PipelineStage::BuildVerify => "build_verify",
            PipelineStage::LibraryFix => "library_fix",
            PipelineStage::Coverage => "coverage",
            PipelineStage::RefineWithCoverage => "refine_with_coverage",
            PipelineStage::AugmentUncovered => "augment_uncovered",
            PipelineStage::Report => "report",
            PipelineStage::Done => "done",
            PipelineStage::Aborted => "aborted",
        }
    }

    /// Human-readable title for console banners and the report.
    pub fn title(&self) -> &'static str {
        match self {
            PipelineStage::Stage => "Create Replicas",
            PipelineStage::Refactor => "Refactor for Testability",
            PipelineStage::Generate => "Initial Test Generation",
            PipelineStage::DedupOracle => "Deduplicate Tests (Oracle)",
            PipelineStage::DedupMechanical => "Deduplicate Tests (Mechanical)",
            PipelineStage::BuildVerify => "Build and Debug",
            PipelineStage::LibraryFix => "Add Missing Libraries",
            PipelineStage::Coverage => "Coverage Analysis",
            PipelineStage::RefineWithCoverage => "Final Refinement with Coverage",
            PipelineStage::AugmentUncovered => "Generate Tests for Uncovered Code",
            PipelineStage::Report => "Final Output",
            PipelineStage::Done => "Done",
            PipelineStage::Aborted => "Aborted",
        }
    }

    /// 1-based position among the work stages (0 for terminal states).
    pub fn step_number(&self) -> usize {
        Self::WORK
            .iter()
            .position(|s| s == self)
            .map_or(0, |p| p + 1)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Aborted)
    }
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Ran to the end (individual artifacts may have been skipped).
    Completed,
    /// Ran, but some work fell back to a degraded result.
    Degraded,
    /// Not applicable on this run.
    Skipped,
    /// Generation produced no artifacts at all.
    NothingGenerated,
    BuildVerified,
    BuildUnverified,
}

impl StageOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            StageOutcome::Completed => "completed",
            StageOutcome::Degraded => "degraded",
            StageOutcome::Skipped => "skipped",
            StageOutcome::NothingGenerated => "nothing_generated",
            StageOutcome::BuildVerified => "build_verified",
            StageOutcome::BuildUnverified => "build_unverified",
        }
    }
}

/// The stage following `stage` given how it ended.
///
/// Only two outcomes branch: total generation failure aborts the run, and an
/// unverified build detours through `LibraryFix`. Everything else advances.
pub fn next_stage(stage: PipelineStage, outcome: StageOutcome) -> PipelineStage {
    use PipelineStage::*;

    match (stage, outcome) {
        (Stage, _) => Refactor,
        (Refactor, _) => Generate,
        (Generate, StageOutcome::NothingGenerated) => Aborted,
        (Generate, _) => DedupOracle,
        (DedupOracle, _) => DedupMechanical,
        (DedupMechanical, _) => BuildVerify,
        (BuildVerify, StageOutcome::BuildUnverified) => LibraryFix,
        (BuildVerify, _) => Coverage,
        (LibraryFix, _) => Coverage,
        (Coverage, _) => RefineWithCoverage,
        (RefineWithCoverage, _) => AugmentUncovered,
        (AugmentUncovered, _) => Report,
        (Report, _) => Done,
        (Done, _) => Done,
        (Aborted, _) => Aborted,
    }
}
