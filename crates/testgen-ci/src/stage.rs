//! Command stage definitions for the build, test and coverage tools.

use serde::{Deserialize, Serialize};

/// Builtin tool stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// `./build.sh` on Unix, `cmake --build build` on Windows
    Build,

    /// ctest --output-on-failure
    Test,

    /// gcov, invoked with one source file appended
    Coverage,
}

impl BuiltinStage {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStage::Build => "build",
            BuiltinStage::Test => "test",
            BuiltinStage::Coverage => "coverage",
        }
    }

    /// Get the stage's command for the current platform.
    pub fn command(&self) -> Vec<String> {
        match self {
            BuiltinStage::Build if cfg!(windows) => args(&["cmake", "--build", "build"]),
            BuiltinStage::Build => args(&["./build.sh"]),
            BuiltinStage::Test => args(&["ctest", "--output-on-failure"]),
            BuiltinStage::Coverage => args(&["gcov"]),
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Configuration for one external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Human-readable stage name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds (0 = unbounded).
    #[serde(default)]
    pub timeout_secs: u64,

    /// Whether this stage is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl StageConfig {
    /// Create a new stage configuration from a builtin stage.
    pub fn from_builtin(stage: BuiltinStage, timeout_secs: u64) -> Self {
        Self {
            name: stage.name().to_string(),
            command: stage.command(),
            timeout_secs,
            enabled: true,
        }
    }

    /// Create a custom stage configuration.
    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
            enabled: true,
        }
    }

    /// Disable this stage.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Copy of this stage with one extra trailing argument.
    pub fn with_arg(&self, arg: impl Into<String>) -> Self {
        let mut config = self.clone();
        config.command.push(arg.into());
        config
    }

    /// Command rendered for log output.
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_stage_names() {
        assert_eq!(BuiltinStage::Build.name(), "build");
        assert_eq!(BuiltinStage::Test.name(), "test");
        assert_eq!(BuiltinStage::Coverage.name(), "coverage");
    }

    #[test]
    fn test_builtin_build_command_is_platform_specific() {
        let cmd = BuiltinStage::Build.command();
        if cfg!(windows) {
            assert_eq!(cmd, vec!["cmake", "--build", "build"]);
        } else {
            assert_eq!(cmd, vec!["./build.sh"]);
        }
    }

    #[test]
    fn test_builtin_test_command() {
        assert_eq!(
            BuiltinStage::Test.command(),
            vec!["ctest", "--output-on-failure"]
        );
    }

    #[test]
    fn test_with_arg_leaves_original_untouched() {
        let gcov = StageConfig::from_builtin(BuiltinStage::Coverage, 60);
        let per_file = gcov.with_arg("models/User.cc");
        assert_eq!(gcov.command, vec!["gcov"]);
        assert_eq!(per_file.command, vec!["gcov", "models/User.cc"]);
        assert_eq!(per_file.display_command(), "gcov models/User.cc");
    }

    #[test]
    fn test_stage_config_disabled() {
        let config = StageConfig::from_builtin(BuiltinStage::Test, 300).disabled();
        assert!(!config.enabled);
    }

    #[test]
    fn test_stage_config_deserializes_with_defaults() {
        let config: StageConfig =
            serde_json::from_str(r#"{"name":"build","command":["make"]}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.timeout_secs, 0);
    }
}
