//! Everything a stage reads, and everything a run accumulates.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testgen_ci::{BuildAttempt, BuildTool, CoverageReport, CoverageTool, MissingLibrary};
use testgen_oracle::OracleClient;

use crate::config::PipelineConfig;
use crate::dedup::Deduplicator;
use crate::domain::{GeneratedArtifact, SourceUnit};
use crate::error::Result;
use crate::instructions::InstructionSet;
use crate::normalize::Normalizer;
use crate::repair::RepairPolicy;
use crate::staging::StagingArea;

use super::machine::{PipelineStage, StageOutcome};

/// Read-only inputs shared by every stage of a run.
pub struct PipelineContext<'a> {
    pub config: &'a PipelineConfig,
    pub oracle: &'a dyn OracleClient,
    pub build: &'a dyn BuildTool,
    pub coverage: &'a dyn CoverageTool,
    pub normalizer: Normalizer,
    pub deduplicator: Deduplicator,
    pub instructions: InstructionSet,
    pub staging: StagingArea,
    pub policy: RepairPolicy,
    /// Source units in scan order.
    pub units: Vec<SourceUnit>,
}

impl<'a> PipelineContext<'a> {
    /// Assemble a context from validated configuration.
    ///
    /// Instructions start as the built-in defaults; use
    /// [`with_instructions`](Self::with_instructions) to supply loaded ones.
    pub fn new(
        config: &'a PipelineConfig,
        oracle: &'a dyn OracleClient,
        build: &'a dyn BuildTool,
        coverage: &'a dyn CoverageTool,
        units: Vec<SourceUnit>,
    ) -> Result<Self> {
        Ok(PipelineContext {
            config,
            oracle,
            build,
            coverage,
            normalizer: Normalizer::new(config.rewrite_table()?),
            deduplicator: Deduplicator::new(config.test_macros.clone()),
            instructions: InstructionSet::default(),
            staging: StagingArea::new(&config.staging_dir, &config.artifact_prefix),
            policy: RepairPolicy::new(config.max_repairs),
            units,
        })
    }

    pub fn with_instructions(mut self, instructions: InstructionSet) -> Self {
        self.instructions = instructions;
        self
    }
}

/// Timing and outcome of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: PipelineStage,
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

/// Mutable state threaded through the stages of one run.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Current position in the state machine.
    pub stage: PipelineStage,
    /// Artifacts keyed by their source unit's path.
    pub artifacts: BTreeMap<PathBuf, GeneratedArtifact>,
    /// Units for which initial generation succeeded.
    pub generated: usize,
    pub build_attempts: Vec<BuildAttempt>,
    pub repairs_used: u32,
    pub build_verified: bool,
    pub coverage: Option<CoverageReport>,
    pub advisories: Vec<MissingLibrary>,
    pub stages: Vec<StageRecord>,
    pub oracle_failures: usize,
}

impl PipelineState {
    pub fn new(run_id: impl Into<String>) -> Self {
        PipelineState {
            run_id: run_id.into(),
            started_at: Utc::now(),
            stage: PipelineStage::Stage,
            artifacts: BTreeMap::new(),
            generated: 0,
            build_attempts: Vec::new(),
            repairs_used: 0,
            build_verified: false,
            coverage: None,
            advisories: Vec::new(),
            stages: Vec::new(),
            oracle_failures: 0,
        }
    }

    pub fn last_build(&self) -> Option<&BuildAttempt> {
        self.build_attempts.last()
    }

    /// Text handed to coverage-driven stages.
    pub fn coverage_summary(&self) -> &str {
        self.coverage
            .as_ref()
            .map_or(testgen_ci::coverage::NO_COVERAGE_PLACEHOLDER, |c| {
                c.summary.as_str()
            })
    }

    pub fn is_aborted(&self) -> bool {
        self.stage == PipelineStage::Aborted
    }
}
