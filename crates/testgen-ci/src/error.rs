//! Error types for testgen-ci

use thiserror::Error;

/// Failures while running an external command.
///
/// The build and coverage adapters fold these into their results; they are
/// only surfaced directly by `CommandRunner`.
#[derive(Error, Debug)]
pub enum CiError {
    #[error("stage {name} has an empty command")]
    EmptyCommand { name: String },

    #[error("failed to spawn {program} for stage {name}: {source}")]
    Spawn {
        name: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stage {name} timed out after {secs} seconds")]
    Timeout { name: String, secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for testgen-ci operations
pub type Result<T> = std::result::Result<T, CiError>;
