//! Pipeline configuration.
//!
//! Every field has a default matching a Drogon project laid out as
//! `*.cc`, `controllers/`, `models/` and `utils/`. A `testgen.toml` file can
//! override any subset; command-line flags override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use testgen_ci::{BuildCommands, BuiltinStage, StageConfig};
use testgen_oracle::GeminiConfig;
use tracing::debug;

use crate::dedup::DEFAULT_TEST_MACROS;
use crate::error::{Result, TestgenError};
use crate::normalize::{default_rewrite_rules, RewriteRule, RewriteTable};

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "testgen.toml";

/// Highest accepted `max_repairs`.
pub const MAX_REPAIRS_LIMIT: u32 = 100;

/// A directory of source files sharing a logical group name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    /// Group label, e.g. `controller`.
    pub name: String,
    /// Directory relative to the project root (`.` for the root itself).
    pub dir: PathBuf,
}

impl SourceGroup {
    pub fn new(name: &str, dir: &str) -> Self {
        SourceGroup {
            name: name.to_string(),
            dir: PathBuf::from(dir),
        }
    }
}

/// Which files are source units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSelection {
    /// File extension without the dot.
    pub extension: String,
    /// Scanned in order; each directory non-recursively.
    pub groups: Vec<SourceGroup>,
}

impl Default for SourceSelection {
    fn default() -> Self {
        SourceSelection {
            extension: "cc".to_string(),
            groups: vec![
                SourceGroup::new("root", "."),
                SourceGroup::new("controller", "controllers"),
                SourceGroup::new("model", "models"),
                SourceGroup::new("utility", "utils"),
            ],
        }
    }
}

/// Full configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Shown in the report header.
    pub project_name: String,
    /// Where sources live and build/coverage commands run.
    pub project_root: PathBuf,
    /// One artifact per source unit is kept here.
    pub staging_dir: PathBuf,
    /// Receives `coverage_report.txt`, `test_report.txt` and `run_summary.json`.
    pub output_dir: PathBuf,
    pub instructions_dir: PathBuf,
    /// Key-value file holding the oracle API key.
    pub env_file: PathBuf,
    /// Prepended to the source file name to name its artifact.
    pub artifact_prefix: String,
    pub sources: SourceSelection,
    /// Macro names that open a test case.
    pub test_macros: Vec<String>,
    pub rewrite_rules: Vec<RewriteRule>,
    /// Repair attempts after the first failing build.
    pub max_repairs: u32,
    pub build: BuildCommands,
    pub coverage: StageConfig,
    pub oracle: GeminiConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            project_name: "Org Chart API (C++ with Drogon Framework)".to_string(),
            project_root: PathBuf::from("."),
            staging_dir: PathBuf::from("generated_tests"),
            output_dir: PathBuf::from("coverage"),
            instructions_dir: PathBuf::from("instructions"),
            env_file: PathBuf::from(".env"),
            artifact_prefix: "test_".to_string(),
            sources: SourceSelection::default(),
            test_macros: DEFAULT_TEST_MACROS.iter().map(|m| m.to_string()).collect(),
            rewrite_rules: default_rewrite_rules(),
            max_repairs: 3,
            build: BuildCommands::default(),
            coverage: StageConfig::from_builtin(BuiltinStage::Coverage, 0),
            oracle: GeminiConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `testgen.toml` in the
    /// working directory is used if present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| TestgenError::file_io(&path, e))?;
        let config = Self::from_toml(&raw).map_err(|source| TestgenError::ConfigParse {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Reject settings no run could work with.
    pub fn validate(&self) -> Result<()> {
        if self.test_macros.iter().any(|m| m.trim().is_empty()) {
            return Err(TestgenError::InvalidConfig(
                "test macro names must not be empty".to_string(),
            ));
        }
        if self.sources.extension.trim().is_empty() {
            return Err(TestgenError::InvalidConfig(
                "source extension must not be empty".to_string(),
            ));
        }
        if self.artifact_prefix.is_empty() {
            return Err(TestgenError::InvalidConfig(
                "artifact prefix must not be empty".to_string(),
            ));
        }
        if self.max_repairs > MAX_REPAIRS_LIMIT {
            return Err(TestgenError::InvalidConfig(format!(
                "max_repairs must be at most {MAX_REPAIRS_LIMIT}, got {}",
                self.max_repairs
            )));
        }
        if self.build.build.command.is_empty() || self.coverage.command.is_empty() {
            return Err(TestgenError::InvalidConfig(
                "build and coverage commands must not be empty".to_string(),
            ));
        }
        self.rewrite_table()?;
        Ok(())
    }

    pub fn rewrite_table(&self) -> Result<RewriteTable> {
        RewriteTable::new(self.rewrite_rules.clone())
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_instructions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.instructions_dir = dir.into();
        self
    }

    pub fn with_max_repairs(mut self, max_repairs: u32) -> Self {
        self.max_repairs = max_repairs;
        self
    }
}
