//! Error taxonomy for testgen pipeline runs.
//!
//! Oracle and build failures are deliberately absent: the orchestrator
//! recovers from those locally. What remains here either stops a run before
//! it starts or is the single fatal condition during a run.

use std::path::PathBuf;

use testgen_oracle::CredentialError;

#[derive(Debug, thiserror::Error)]
pub enum TestgenError {
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid rewrite rule {local:?} -> {relocated:?}: {reason}")]
    InvalidRewriteRule {
        local: String,
        relocated: String,
        reason: String,
    },

    #[error("project root not found: {0}")]
    ProjectRootNotFound(PathBuf),

    #[error("no tests were generated ({attempted} source files attempted)")]
    NothingGenerated { attempted: usize },

    #[error("report error: {0:#}")]
    Report(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestgenError {
    pub(crate) fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TestgenError::FileIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type for testgen-core operations.
pub type Result<T> = std::result::Result<T, TestgenError>;
