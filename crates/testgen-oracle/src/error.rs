//! Error types for testgen-oracle

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by an oracle `transform` call.
///
/// None of these are fatal to a pipeline run: the orchestrator logs them and
/// skips the current artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Network error, connection failure or timeout
    #[error("transport failure: {0}")]
    Transport(String),

    /// Response did not have the expected content structure
    #[error("protocol failure: {0}")]
    Protocol(String),

    /// The oracle declined the request and said why
    #[error("oracle rejected request: {reason}")]
    Rejected { reason: String },

    /// Client could not be constructed
    #[error("oracle configuration error: {0}")]
    Configuration(String),
}

impl OracleError {
    /// Short machine-friendly name used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Transport(_) => "transport",
            OracleError::Protocol(_) => "protocol",
            OracleError::Rejected { .. } => "rejected",
            OracleError::Configuration(_) => "configuration",
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            OracleError::Protocol(err.to_string())
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

/// Errors raised while reading the oracle API key.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Key file does not exist
    #[error("credentials file not found: {0}")]
    FileNotFound(PathBuf),

    /// Key file exists but could not be parsed
    #[error("credentials file {path} is malformed: {message}")]
    Malformed { path: PathBuf, message: String },

    /// Key is absent from the file
    #[error("{key} not found in {path}")]
    MissingKey { key: String, path: PathBuf },

    /// Key is present but blank
    #[error("{key} is empty")]
    Empty { key: String },

    /// Key does not carry the expected prefix
    #[error("invalid {key} format, expected a value starting with '{prefix}'")]
    InvalidFormat { key: String, prefix: String },
}
