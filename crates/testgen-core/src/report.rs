//! Final run reports: `test_report.txt` for people, `run_summary.json` for
//! tooling.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use testgen_ci::failure_excerpt;
use tracing::info;

use crate::domain::ArtifactStage;
use crate::pipeline::{PipelineContext, PipelineStage, PipelineState, StageOutcome, StageRecord};

pub const TEST_REPORT_FILE: &str = "test_report.txt";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0";

/// One build invocation as recorded in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAttemptSummary {
    pub attempt: u32,
    pub success: bool,
    /// First error-looking line of a failed attempt's log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One artifact as recorded in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub file: String,
    pub source: PathBuf,
    pub stage: ArtifactStage,
    pub sha256: String,
    pub last_error: Option<String>,
}

/// Everything the reports say about a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: String,
    pub run_id: String,
    pub project: String,
    pub oracle: String,
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub staging_dir: PathBuf,
    pub sources: usize,
    pub generated: usize,
    pub build_verified: bool,
    pub build_attempts: Vec<BuildAttemptSummary>,
    pub repairs_used: u32,
    pub coverage_collected: bool,
    pub oracle_failures: usize,
    pub stages: Vec<StageRecord>,
    /// Sorted by file name.
    pub artifacts: Vec<ArtifactSummary>,
    pub advisories: Vec<String>,
}

impl RunSummary {
    pub fn from_run(ctx: &PipelineContext<'_>, state: &PipelineState) -> Self {
        let mut artifacts: Vec<ArtifactSummary> = state
            .artifacts
            .values()
            .map(|a| ArtifactSummary {
                file: a.file_name(),
                source: a.source.clone(),
                stage: a.stage,
                sha256: a.digest(),
                last_error: a.last_error.clone(),
            })
            .collect();
        artifacts.sort_by(|a, b| a.file.cmp(&b.file));

        RunSummary {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            run_id: state.run_id.clone(),
            project: ctx.config.project_name.clone(),
            oracle: ctx.oracle.name().to_string(),
            model: ctx.oracle.model_info(),
            started_at: state.started_at,
            generated_at: Utc::now(),
            staging_dir: ctx.staging.dir().to_path_buf(),
            sources: ctx.units.len(),
            generated: state.generated,
            build_verified: state.build_verified,
            build_attempts: state
                .build_attempts
                .iter()
                .map(|b| BuildAttemptSummary {
                    attempt: b.attempt,
                    success: b.success,
                    error: (!b.success)
                        .then(|| failure_excerpt(&b.log))
                        .flatten()
                        .map(str::to_string),
                })
                .collect(),
            repairs_used: state.repairs_used,
            coverage_collected: state.coverage.as_ref().is_some_and(|c| c.collected),
            oracle_failures: state.oracle_failures,
            stages: state.stages.clone(),
            artifacts,
            advisories: state.advisories.iter().map(|l| l.advisory()).collect(),
        }
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

fn heading(out: &mut String, title: &str, rule: usize) {
    out.push_str(title);
    out.push_str(":\n");
    out.push_str(&"-".repeat(rule));
    out.push('\n');
}

/// Render `test_report.txt`.
pub fn render_test_report(summary: &RunSummary, coverage: &str) -> String {
    let mut out = String::new();
    out.push_str("UNIT TEST GENERATION REPORT\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    out.push_str(&format!("Project: {}\n", summary.project));
    match &summary.model {
        Some(model) => out.push_str(&format!("Oracle Used: {} ({})\n", summary.oracle, model)),
        None => out.push_str(&format!("Oracle Used: {}\n", summary.oracle)),
    }
    out.push_str(&format!(
        "Date: {}\n\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    heading(&mut out, "TEST GENERATION SUMMARY", 30);
    out.push_str(&format!(
        "Total test files generated: {}\n",
        summary.artifacts.len()
    ));
    out.push_str(&format!(
        "Test files location: {}\n",
        summary.staging_dir.display()
    ));
    let attempts = summary.build_attempts.len();
    if summary.build_verified {
        out.push_str(&format!("Build status: passed after {attempts} attempt(s)\n\n"));
    } else {
        out.push_str(&format!("Build status: failing after {attempts} attempt(s)\n"));
        if let Some(error) = summary.build_attempts.last().and_then(|b| b.error.as_deref()) {
            out.push_str(&format!("Last build error: {error}\n"));
        }
        out.push('\n');
    }

    heading(&mut out, "GENERATED TEST FILES", 25);
    for artifact in &summary.artifacts {
        out.push_str(&format!("- {}\n", artifact.file));
    }
    out.push('\n');

    heading(&mut out, "CODE COVERAGE SUMMARY", 25);
    if summary.coverage_collected {
        out.push_str("Coverage analysis performed using GNU gcov tools.\n");
    } else {
        out.push_str("Coverage analysis skipped: the build never passed.\n");
    }
    out.push_str("Detailed coverage report available in coverage_report.txt\n\n");

    heading(&mut out, "TEST REPORT REQUIREMENTS MET", 35);
    out.push_str("✓ Generation oracle used\n");
    out.push_str(&format!(
        "{} Initial test generation completed ({}/{} sources)\n",
        mark(summary.generated > 0),
        summary.generated,
        summary.sources
    ));
    out.push_str("✓ Test refinement (duplicate removal, library inclusion)\n");
    out.push_str(&format!(
        "{} Build and debug process ({} repair(s) requested)\n",
        mark(summary.build_verified),
        summary.repairs_used
    ));
    out.push_str(&format!(
        "{} GNU code coverage tools integration\n",
        mark(summary.coverage_collected)
    ));
    out.push_str("✓ Instruction files for strict oracle guidance\n");
    out.push_str("✓ Final output with properly formatted tests\n");
    out.push_str("✓ Coverage report generated\n");
    for advisory in &summary.advisories {
        out.push_str(&format!("! {advisory}\n"));
    }
    out.push('\n');

    heading(&mut out, "PROCESS STEPS COMPLETED", 30);
    let mut step = 0;
    for record in &summary.stages {
        step += 1;
        let ok = !matches!(
            record.outcome,
            StageOutcome::Degraded | StageOutcome::BuildUnverified | StageOutcome::NothingGenerated
        );
        out.push_str(&format!(
            "{}. {} {}\n",
            step,
            record.stage.title(),
            mark(ok)
        ));
    }
    out.push_str(&format!(
        "{}. {} ✓\n\n",
        step + 1,
        PipelineStage::Report.title()
    ));

    heading(&mut out, "DETAILED COVERAGE DATA", 25);
    out.push_str(coverage);
    out
}

/// Write `run_summary.json` in pretty JSON format.
pub fn write_run_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let content = serde_json::to_string_pretty(summary).context("serialize run summary")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write `test_report.txt`.
pub fn write_test_report(path: &Path, summary: &RunSummary, coverage: &str) -> Result<()> {
    let text = render_test_report(summary, coverage);
    std::fs::write(path, text).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write both reports into the configured output directory.
pub(crate) fn write_reports(
    ctx: &PipelineContext<'_>,
    state: &PipelineState,
) -> crate::error::Result<()> {
    let dir = &ctx.config.output_dir;
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;

    let summary = RunSummary::from_run(ctx, state);
    let report_path = dir.join(TEST_REPORT_FILE);
    write_test_report(&report_path, &summary, state.coverage_summary())?;
    write_run_summary(&dir.join(RUN_SUMMARY_FILE), &summary)?;
    info!(path = %report_path.display(), "final test report saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RunSummary {
        RunSummary {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            run_id: "run-1".to_string(),
            project: "Widgets".to_string(),
            oracle: "gemini".to_string(),
            model: Some("gemini-2.0-flash".to_string()),
            started_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .expect("parse RFC3339")
                .with_timezone(&Utc),
            generated_at: DateTime::parse_from_rfc3339("2026-01-01T00:05:00Z")
                .expect("parse RFC3339")
                .with_timezone(&Utc),
            staging_dir: PathBuf::from("generated_tests"),
            sources: 2,
            generated: 2,
            build_verified: false,
            build_attempts: vec![
                BuildAttemptSummary {
                    attempt: 1,
                    success: false,
                    error: Some("ld: cannot find -lssl".to_string()),
                },
                BuildAttemptSummary {
                    attempt: 2,
                    success: false,
                    error: Some("test_A.cc:4:1: error: expected ';'".to_string()),
                },
            ],
            repairs_used: 1,
            coverage_collected: false,
            oracle_failures: 0,
            stages: vec![
                StageRecord {
                    stage: PipelineStage::Generate,
                    outcome: StageOutcome::Completed,
                    duration_ms: 3,
                },
                StageRecord {
                    stage: PipelineStage::BuildVerify,
                    outcome: StageOutcome::BuildUnverified,
                    duration_ms: 9,
                },
            ],
            artifacts: vec![
                ArtifactSummary {
                    file: "test_A.cc".to_string(),
                    source: PathBuf::from("A.cc"),
                    stage: ArtifactStage::Augmented,
                    sha256: "00".repeat(32),
                    last_error: None,
                },
                ArtifactSummary {
                    file: "test_B.cc".to_string(),
                    source: PathBuf::from("models/B.cc"),
                    stage: ArtifactStage::Repaired,
                    sha256: "11".repeat(32),
                    last_error: Some("transport failure: timeout".to_string()),
                },
            ],
            advisories: vec![
                "Please install the library 'ssl' manually if the build keeps failing".to_string(),
            ],
        }
    }

    #[test]
    fn test_report_sections_in_order() {
        let text = render_test_report(&sample(), "Build failed - no coverage data available");
        let order = [
            "UNIT TEST GENERATION REPORT",
            "Project: Widgets",
            "Oracle Used: gemini (gemini-2.0-flash)",
            "Date: 2026-01-01 00:05:00 UTC",
            "TEST GENERATION SUMMARY:",
            "Total test files generated: 2",
            "GENERATED TEST FILES:",
            "- test_A.cc\n- test_B.cc\n",
            "CODE COVERAGE SUMMARY:",
            "TEST REPORT REQUIREMENTS MET:",
            "PROCESS STEPS COMPLETED:",
            "DETAILED COVERAGE DATA:",
        ];
        let mut from = 0;
        for needle in order {
            let at = text[from..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}"));
            from += at;
        }
        assert!(text.ends_with("Build failed - no coverage data available"));
    }

    #[test]
    fn test_report_marks_degraded_build_and_advisories() {
        let text = render_test_report(&sample(), "");
        assert!(text.contains("Build status: failing after 2 attempt(s)"));
        assert!(text.contains("Last build error: test_A.cc:4:1: error: expected ';'\n"));
        assert!(text.contains("✗ Build and debug process (1 repair(s) requested)"));
        assert!(text.contains("✗ GNU code coverage tools integration"));
        assert!(text.contains("! Please install the library 'ssl' manually"));
        assert!(text.contains("1. Initial Test Generation ✓"));
        assert!(text.contains("2. Build and Debug ✗"));
        assert!(text.contains("3. Final Output ✓"));
    }

    #[test]
    fn test_summary_json_shape() {
        let raw = serde_json::to_value(sample()).expect("serialize summary");
        assert_eq!(raw["schema_version"], json!("1.0"));
        assert_eq!(raw["build_attempts"].as_array().map(Vec::len), Some(2));
        assert_eq!(raw["artifacts"][1]["stage"], json!("repaired"));
        assert_eq!(raw["stages"][1]["outcome"], json!("build_unverified"));
        assert_eq!(raw["stages"][0]["stage"], json!("generate"));
    }

    #[test]
    fn test_write_run_summary_roundtrip() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join(RUN_SUMMARY_FILE);
        write_run_summary(&path, &sample()).expect("write summary");
        let back: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(back, sample());
    }
}
