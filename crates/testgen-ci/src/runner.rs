//! External command execution.

use crate::error::{CiError, Result};
use crate::stage::StageConfig;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Result of a stage execution.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Stage name.
    pub stage_name: String,

    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StageResult {
    /// Whether this stage passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// stdout and stderr joined by a newline.
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs one configured command to completion in a working directory.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute a stage from `cwd` and capture its output.
    ///
    /// The child is killed if the timeout elapses.
    pub async fn execute(config: &StageConfig, cwd: &Path) -> Result<StageResult> {
        let start = Instant::now();

        let Some((exe, args)) = config.command.split_first() else {
            return Err(CiError::EmptyCommand {
                name: config.name.clone(),
            });
        };

        debug!(stage = %config.name, command = %config.display_command(), cwd = %cwd.display(), "running command");

        let child = Command::new(exe)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CiError::Spawn {
                name: config.name.clone(),
                program: exe.clone(),
                source,
            })?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| CiError::Timeout {
                name: config.name.clone(),
                secs: config.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(StageResult {
            stage_name: config.name.clone(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, success: bool) -> StageResult {
        StageResult {
            stage_name: "build".to_string(),
            exit_code,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            duration_ms: 100,
            success,
        }
    }

    #[test]
    fn test_stage_result_passed() {
        assert!(result(0, true).passed());
        assert!(!result(1, false).passed());
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(result(0, true).combined_output(), "out\nerr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = StageConfig::custom("echo_test", vec!["echo".into(), "hello".into()], 60);

        let result = CommandRunner::execute(&config, dir.path()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let config = StageConfig::custom("ls", vec!["ls".into()], 60);

        let result = CommandRunner::execute(&config, dir.path()).await.unwrap();
        assert!(result.stdout.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = StageConfig::custom("false_test", vec!["false".into()], 60);

        let result = CommandRunner::execute(&config, dir.path()).await.unwrap();
        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = StageConfig::custom("sleepy", vec!["sleep".into(), "5".into()], 1);

        let err = CommandRunner::execute(&config, dir.path()).await.unwrap_err();
        assert!(matches!(err, CiError::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = StageConfig::custom("empty", vec![], 60);

        let err = CommandRunner::execute(&config, dir.path()).await.unwrap_err();
        assert!(matches!(err, CiError::EmptyCommand { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = StageConfig::custom(
            "missing",
            vec!["definitely-not-a-real-program-4f2a".into()],
            60,
        );

        let err = CommandRunner::execute(&config, dir.path()).await.unwrap_err();
        assert!(matches!(err, CiError::Spawn { .. }));
    }
}
