//! API key loading from a local key-value file

use crate::error::CredentialError;
use std::path::Path;
use tracing::debug;

/// Key name looked up in the credentials file
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Prefix every valid key starts with
pub const API_KEY_PREFIX: &str = "AIza";

/// Read and validate the API key from a `.env`-style file.
///
/// The process environment is never consulted or modified; only the file
/// counts.
pub fn load_api_key(path: &Path) -> Result<String, CredentialError> {
    if !path.exists() {
        return Err(CredentialError::FileNotFound(path.to_path_buf()));
    }

    let entries = dotenvy::from_path_iter(path).map_err(|e| CredentialError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut found = None;
    for entry in entries {
        let (key, value) = entry.map_err(|e| CredentialError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if key == API_KEY_VAR {
            found = Some(value);
        }
    }

    let value = found.ok_or_else(|| CredentialError::MissingKey {
        key: API_KEY_VAR.to_string(),
        path: path.to_path_buf(),
    })?;

    let key = validate_api_key(&value)?;
    debug!(path = %path.display(), "loaded oracle API key");
    Ok(key)
}

/// Check a raw key value: non-empty and carrying the expected prefix.
pub fn validate_api_key(raw: &str) -> Result<String, CredentialError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(CredentialError::Empty {
            key: API_KEY_VAR.to_string(),
        });
    }
    if !key.starts_with(API_KEY_PREFIX) {
        return Err(CredentialError::InvalidFormat {
            key: API_KEY_VAR.to_string(),
            prefix: API_KEY_PREFIX.to_string(),
        });
    }
    Ok(key.to_string())
}
