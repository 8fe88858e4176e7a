//! Source units and the artifacts generated for them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// One source file selected for test generation. Immutable once scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Path relative to the project root; the unit's identity.
    pub path: PathBuf,
    /// Raw file content.
    pub content: String,
    /// Logical group, e.g. `controller` or `model`.
    pub group: String,
}

impl SourceUnit {
    /// Base file name, e.g. `User.cc`.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

/// The last pipeline step that successfully changed an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStage {
    Staged,
    Refactored,
    Generated,
    OracleDeduplicated,
    Deduplicated,
    Repaired,
    LibrariesAdded,
    Refined,
    Augmented,
}

/// The generated test file for one `SourceUnit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Identity of the source unit this artifact belongs to.
    pub source: PathBuf,
    /// Location in the staging directory.
    pub path: PathBuf,
    /// Raw oracle response behind the current content, if any.
    pub raw_response: Option<String>,
    /// Current (normalized) content.
    pub code: String,
    pub stage: ArtifactStage,
    /// Most recent failure affecting this artifact.
    pub last_error: Option<String>,
}

impl GeneratedArtifact {
    /// Literal copy of the source unit placed in staging.
    pub fn staged(unit: &SourceUnit, path: PathBuf) -> Self {
        GeneratedArtifact {
            source: unit.path.clone(),
            path,
            raw_response: None,
            code: unit.content.clone(),
            stage: ArtifactStage::Staged,
            last_error: None,
        }
    }

    /// Replace the content with a successfully normalized oracle response.
    pub fn accept(&mut self, stage: ArtifactStage, raw: String, code: String) {
        self.raw_response = Some(raw);
        self.code = code;
        self.stage = stage;
        self.last_error = None;
    }

    /// Replace the content with locally derived text.
    pub fn rewrite(&mut self, stage: ArtifactStage, code: String) {
        self.code = code;
        self.stage = stage;
        self.last_error = None;
    }

    /// Note a failure without touching the content.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Artifact file name, e.g. `test_User.cc`.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Hex SHA-256 of the current content.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.code.as_bytes()))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
