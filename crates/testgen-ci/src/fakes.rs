//! Scripted build and coverage tools (testing only)

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::build::{BuildAttempt, BuildTool};
use crate::coverage::{CoverageEntry, CoverageReport, CoverageTool};

// ---------------------------------------------------------------------------
// ScriptedBuildTool
// ---------------------------------------------------------------------------

/// Build tool answering from a queue of (success, log) outcomes.
///
/// Once the queue runs dry every further invocation repeats `fallback`.
#[derive(Debug)]
pub struct ScriptedBuildTool {
    outcomes: Mutex<VecDeque<(bool, String)>>,
    fallback: (bool, String),
    invocations: Mutex<u32>,
}

impl ScriptedBuildTool {
    pub fn new<I, S>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (bool, S)>,
        S: Into<String>,
    {
        ScriptedBuildTool {
            outcomes: Mutex::new(outcomes.into_iter().map(|(ok, log)| (ok, log.into())).collect()),
            fallback: (false, "scripted build failure".to_string()),
            invocations: Mutex::new(0),
        }
    }

    /// A build that always passes.
    pub fn always_passing() -> Self {
        Self::new(std::iter::empty::<(bool, String)>()).with_fallback(true, "build ok")
    }

    /// A build that always fails with `log`.
    pub fn always_failing(log: impl Into<String>) -> Self {
        Self::new(std::iter::empty::<(bool, String)>()).with_fallback(false, log)
    }

    pub fn with_fallback(mut self, success: bool, log: impl Into<String>) -> Self {
        self.fallback = (success, log.into());
        self
    }

    /// Number of `build_and_test` calls so far.
    pub fn invocations(&self) -> u32 {
        *self.invocations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BuildTool for ScriptedBuildTool {
    async fn build_and_test(&self, attempt: u32) -> BuildAttempt {
        *self.invocations.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        let (success, log) = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        BuildAttempt {
            attempt,
            log,
            success,
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedCoverageTool
// ---------------------------------------------------------------------------

/// Coverage tool producing the same canned output for every file.
#[derive(Debug)]
pub struct ScriptedCoverageTool {
    output: String,
    requests: Mutex<Vec<Vec<PathBuf>>>,
}

impl ScriptedCoverageTool {
    pub fn new(output: impl Into<String>) -> Self {
        ScriptedCoverageTool {
            output: output.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// File lists passed to `collect`, one per call.
    pub fn requests(&self) -> Vec<Vec<PathBuf>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CoverageTool for ScriptedCoverageTool {
    async fn collect(&self, files: &[PathBuf]) -> CoverageReport {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(files.to_vec());
        CoverageReport::from_entries(
            files
                .iter()
                .map(|f| CoverageEntry {
                    file: f.to_string_lossy().into_owned(),
                    output: self.output.clone(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_build_sequence_then_fallback() {
        let tool = ScriptedBuildTool::new([(false, "boom"), (true, "ok")]);
        assert!(!tool.build_and_test(1).await.success);
        assert!(tool.build_and_test(2).await.success);
        let third = tool.build_and_test(3).await;
        assert!(!third.success);
        assert_eq!(third.log, "scripted build failure");
        assert_eq!(tool.invocations(), 3);
    }

    #[tokio::test]
    async fn test_scripted_coverage_records_requests() {
        let tool = ScriptedCoverageTool::new("Lines executed:100.00% of 1");
        let report = tool.collect(&[PathBuf::from("a.cc")]).await;
        assert_eq!(report.entries.len(), 1);
        assert_eq!(tool.requests(), vec![vec![PathBuf::from("a.cc")]]);
    }
}
