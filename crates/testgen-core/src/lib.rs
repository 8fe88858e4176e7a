//! testgen Core Library
//!
//! Turns a directory of C++ sources into oracle-generated, deduplicated,
//! build-verified and coverage-refined test files.

pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod instructions;
pub mod normalize;
pub mod obs;
pub mod pipeline;
pub mod repair;
pub mod report;
pub mod scanner;
pub mod staging;
pub mod telemetry;

pub use config::{
    PipelineConfig, SourceGroup, SourceSelection, DEFAULT_CONFIG_FILE, MAX_REPAIRS_LIMIT,
};
pub use dedup::{Deduplicator, Segment, DEFAULT_TEST_MACROS};
pub use domain::{ArtifactStage, GeneratedArtifact, SourceUnit};
pub use error::{Result, TestgenError};
pub use instructions::{InstructionKind, InstructionSet, InstructionSource};
pub use normalize::{default_rewrite_rules, strip_fences, Normalizer, RewriteRule, RewriteTable};
pub use pipeline::{
    next_stage, Pipeline, PipelineContext, PipelineStage, PipelineState, StageOutcome,
    StageRecord,
};
pub use repair::{decide, repair_request, RepairDecision, RepairPolicy};
pub use report::{render_test_report, RunSummary, RUN_SUMMARY_FILE, TEST_REPORT_FILE};
pub use scanner::SourceScanner;
pub use staging::StagingArea;
pub use telemetry::init_tracing;
