//! The staging directory holding one artifact file per source unit.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::SourceUnit;
use crate::error::{Result, TestgenError};

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    prefix: String,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        StagingArea {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| TestgenError::file_io(&self.dir, e))
    }

    /// Where the artifact for `unit` lives: `<dir>/<prefix><file name>`.
    pub fn artifact_path(&self, unit: &SourceUnit) -> PathBuf {
        self.dir.join(format!("{}{}", self.prefix, unit.file_name()))
    }

    /// Overwrite an artifact file.
    pub fn write(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content).map_err(|e| TestgenError::file_io(path, e))?;
        debug!(file = %path.display(), bytes = content.len(), "artifact written");
        Ok(())
    }

    /// Remove an artifact file written during this run.
    pub fn remove(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TestgenError::file_io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(path: &str) -> SourceUnit {
        SourceUnit {
            path: PathBuf::from(path),
            content: String::new(),
            group: "model".to_string(),
        }
    }

    #[test]
    fn test_artifact_path_uses_prefix_and_base_name() {
        let staging = StagingArea::new("generated_tests", "test_");
        assert_eq!(
            staging.artifact_path(&unit("models/User.cc")),
            PathBuf::from("generated_tests/test_User.cc")
        );
    }

    #[test]
    fn test_prepare_write_remove() {
        let dir = TempDir::new().unwrap();
        let staging = StagingArea::new(dir.path().join("nested/staging"), "test_");
        staging.prepare().unwrap();

        let path = staging.artifact_path(&unit("A.cc"));
        staging.write(&path, "int a;").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "int a;");

        staging.remove(&path).unwrap();
        assert!(!path.exists());
        staging.remove(&path).unwrap();
    }
}
