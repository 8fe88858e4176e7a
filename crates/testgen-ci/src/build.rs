//! Build-then-test execution.

use crate::runner::CommandRunner;
use crate::stage::{BuiltinStage, StageConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of one build-and-test invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAttempt {
    /// 1-based attempt index within a run.
    pub attempt: u32,
    /// Combined build (and, if reached, test) output.
    pub log: String,
    /// Both commands exited zero.
    pub success: bool,
}

impl BuildAttempt {
    pub fn passed(attempt: u32, log: impl Into<String>) -> Self {
        BuildAttempt {
            attempt,
            log: log.into(),
            success: true,
        }
    }

    pub fn failed(attempt: u32, log: impl Into<String>) -> Self {
        BuildAttempt {
            attempt,
            log: log.into(),
            success: false,
        }
    }
}

/// Something that can build the project and run its tests.
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Build, then test if the build passed. Never retries.
    async fn build_and_test(&self, attempt: u32) -> BuildAttempt;
}

/// Build and test commands run from the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildCommands {
    pub build: StageConfig,
    pub test: StageConfig,
}

impl Default for BuildCommands {
    fn default() -> Self {
        BuildCommands {
            build: StageConfig::from_builtin(BuiltinStage::Build, 0),
            test: StageConfig::from_builtin(BuiltinStage::Test, 0),
        }
    }
}

/// `BuildTool` backed by real external commands.
#[derive(Debug, Clone)]
pub struct BuildRunner {
    project_root: PathBuf,
    commands: BuildCommands,
}

impl BuildRunner {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        BuildRunner {
            project_root: project_root.into(),
            commands: BuildCommands::default(),
        }
    }

    pub fn with_commands(mut self, commands: BuildCommands) -> Self {
        self.commands = commands;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Run one stage, folding spawn errors and timeouts into a failed log.
    async fn run_stage(&self, stage: &StageConfig) -> (bool, String) {
        match CommandRunner::execute(stage, &self.project_root).await {
            Ok(result) => (result.passed(), result.combined_output()),
            Err(e) => {
                warn!(stage = %stage.name, error = %e, "command could not be run");
                (false, e.to_string())
            }
        }
    }
}

#[async_trait]
impl BuildTool for BuildRunner {
    async fn build_and_test(&self, attempt: u32) -> BuildAttempt {
        let (build_ok, build_log) = self.run_stage(&self.commands.build).await;
        if !build_ok {
            info!(attempt, "build failed");
            return BuildAttempt::failed(attempt, build_log);
        }

        if !self.commands.test.enabled {
            return BuildAttempt::passed(attempt, build_log);
        }

        let (test_ok, test_log) = self.run_stage(&self.commands.test).await;
        info!(attempt, tests_passed = test_ok, "build succeeded, tests ran");

        let log = format!("{build_log}\n{test_log}");
        if test_ok {
            BuildAttempt::passed(attempt, log)
        } else {
            BuildAttempt::failed(attempt, log)
        }
    }
}
