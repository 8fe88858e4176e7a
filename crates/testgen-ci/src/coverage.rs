//! Per-file coverage collection.

use crate::runner::CommandRunner;
use crate::stage::{BuiltinStage, StageConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the written coverage report.
pub const COVERAGE_REPORT_FILE: &str = "coverage_report.txt";

/// Header line of the written coverage report.
pub const COVERAGE_REPORT_HEADER: &str = "GNU Code Coverage Report";

/// Summary used when the build never passed.
pub const NO_COVERAGE_PLACEHOLDER: &str = "Build failed - no coverage data available";

/// Raw tool output for one tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub file: String,
    pub output: String,
}

impl CoverageEntry {
    fn labelled(&self) -> String {
        format!("Coverage for {}:\n{}", self.file, self.output)
    }
}

/// Coverage for a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub entries: Vec<CoverageEntry>,
    /// Labelled entries joined by newlines, or the placeholder text.
    pub summary: String,
    /// False when this is a placeholder standing in for real data.
    pub collected: bool,
}

impl CoverageReport {
    pub fn from_entries(entries: Vec<CoverageEntry>) -> Self {
        let summary = entries
            .iter()
            .map(CoverageEntry::labelled)
            .collect::<Vec<_>>()
            .join("\n");
        CoverageReport {
            entries,
            summary,
            collected: true,
        }
    }

    /// Stand-in report for a run whose build never passed.
    pub fn placeholder() -> Self {
        CoverageReport {
            entries: Vec::new(),
            summary: NO_COVERAGE_PLACEHOLDER.to_string(),
            collected: false,
        }
    }

    /// Full text of `coverage_report.txt`.
    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n\n{}",
            COVERAGE_REPORT_HEADER,
            "=".repeat(50),
            self.summary
        )
    }

    /// Write the report into `output_dir` and return its path.
    pub fn write_to(&self, output_dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(COVERAGE_REPORT_FILE);
        std::fs::write(&path, self.render())?;
        info!(path = %path.display(), "coverage report saved");
        Ok(path)
    }
}

/// Something that can produce coverage for a list of files.
#[async_trait]
pub trait CoverageTool: Send + Sync {
    /// Collect coverage for `files` (relative to the project root).
    /// Never fails: problems are recorded inside the report.
    async fn collect(&self, files: &[PathBuf]) -> CoverageReport;
}

/// `CoverageTool` running one coverage command per file.
#[derive(Debug, Clone)]
pub struct CoverageCollector {
    project_root: PathBuf,
    command: StageConfig,
}

impl CoverageCollector {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        CoverageCollector {
            project_root: project_root.into(),
            command: StageConfig::from_builtin(BuiltinStage::Coverage, 0),
        }
    }

    pub fn with_command(mut self, command: StageConfig) -> Self {
        self.command = command;
        self
    }

    async fn collect_file(&self, file: &str) -> String {
        let stage = self.command.with_arg(file);
        match CommandRunner::execute(&stage, &self.project_root).await {
            Ok(result) if result.passed() => result.stdout,
            Ok(result) => format!(
                "{}[coverage tool exited with status {}: {}]",
                result.stdout,
                result.exit_code,
                result.stderr.trim()
            ),
            Err(e) => format!("[coverage tool failed: {e}]"),
        }
    }
}

#[async_trait]
impl CoverageTool for CoverageCollector {
    async fn collect(&self, files: &[PathBuf]) -> CoverageReport {
        let mut entries = Vec::new();
        for file in files {
            if !self.project_root.join(file).is_file() {
                debug!(file = %file.display(), "skipping coverage for missing file");
                continue;
            }
            let label = file.to_string_lossy().replace('\\', "/");
            let output = self.collect_file(&label).await;
            entries.push(CoverageEntry {
                file: label,
                output,
            });
        }
        info!(files = entries.len(), "coverage collected");
        CoverageReport::from_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_summary_labels_each_file() {
        let report = CoverageReport::from_entries(vec![
            CoverageEntry {
                file: "main.cc".to_string(),
                output: "Lines executed:80.00% of 10".to_string(),
            },
            CoverageEntry {
                file: "models/User.cc".to_string(),
                output: "Lines executed:50.00% of 4".to_string(),
            },
        ]);
        assert_eq!(
            report.summary,
            "Coverage for main.cc:\nLines executed:80.00% of 10\nCoverage for models/User.cc:\nLines executed:50.00% of 4"
        );
        assert!(report.collected);
    }

    #[test]
    fn test_placeholder() {
        let report = CoverageReport::placeholder();
        assert_eq!(report.summary, NO_COVERAGE_PLACEHOLDER);
        assert!(!report.collected);
        assert!(report.entries.is_empty());
    }

    #[test]
    fn test_render_layout() {
        let report = CoverageReport::from_entries(vec![CoverageEntry {
            file: "a.cc".to_string(),
            output: "x".to_string(),
        }]);
        let text = report.render();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("GNU Code Coverage Report"));
        assert_eq!(lines.next(), Some("=".repeat(50).as_str()));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("Coverage for a.cc:"));
    }

    #[test]
    fn test_write_to_creates_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("coverage");
        let path = CoverageReport::placeholder().write_to(&out).unwrap();
        assert_eq!(path, out.join(COVERAGE_REPORT_FILE));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.ends_with(NO_COVERAGE_PLACEHOLDER));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.cc"), "int main() {}").unwrap();
        let collector = CoverageCollector::new(dir.path())
            .with_command(StageConfig::custom("coverage", vec!["echo".into(), "cov".into()], 30));

        let report = collector
            .collect(&[PathBuf::from("main.cc"), PathBuf::from("gone.cc")])
            .await;
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].file, "main.cc");
        assert_eq!(report.entries[0].output, "cov main.cc\n");
    }

    #[tokio::test]
    async fn test_tool_failure_is_recorded_inline() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.cc"), "int main() {}").unwrap();
        let collector = CoverageCollector::new(dir.path()).with_command(StageConfig::custom(
            "coverage",
            vec!["no-such-coverage-tool-77e".into()],
            30,
        ));

        let report = collector.collect(&[PathBuf::from("main.cc")]).await;
        assert!(report
            .summary
            .starts_with("Coverage for main.cc:\n[coverage tool failed:"));
    }
}
