//! Source unit discovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::SourceSelection;
use crate::domain::SourceUnit;
use crate::error::{Result, TestgenError};

/// Enumerates source files group by group.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    project_root: PathBuf,
    selection: SourceSelection,
}

impl SourceScanner {
    pub fn new(project_root: impl Into<PathBuf>, selection: SourceSelection) -> Self {
        SourceScanner {
            project_root: project_root.into(),
            selection,
        }
    }

    /// Read every matching file.
    ///
    /// Groups are visited in configured order and files within a group by
    /// name. Missing group directories are skipped. Artifacts are named after
    /// the base file name, so a second file with an already-seen base name is
    /// skipped with a warning.
    pub fn scan(&self) -> Result<Vec<SourceUnit>> {
        if !self.project_root.is_dir() {
            return Err(TestgenError::ProjectRootNotFound(self.project_root.clone()));
        }

        let mut units = Vec::new();
        let mut seen_names = HashSet::new();

        for group in &self.selection.groups {
            let dir = self.project_root.join(&group.dir);
            if !dir.is_dir() {
                debug!(group = %group.name, dir = %dir.display(), "group directory missing");
                continue;
            }

            for path in self.matching_files(&dir)? {
                let relative = relative_to(&path, &self.project_root);
                let Some(name) = relative.file_name().map(|n| n.to_os_string()) else {
                    continue;
                };
                if !seen_names.insert(name) {
                    warn!(file = %relative.display(), "duplicate source file name, skipping");
                    continue;
                }

                let bytes = std::fs::read(&path).map_err(|e| TestgenError::file_io(&path, e))?;
                units.push(SourceUnit {
                    path: relative,
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                    group: group.name.clone(),
                });
            }
        }

        debug!(count = units.len(), "scanned source units");
        Ok(units)
    }

    fn matching_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|e| TestgenError::file_io(dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| TestgenError::file_io(dir, e))?.path();
            let matches = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == self.selection.extension.as_str());
            if matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// `path` relative to `root`, without any leading `./`.
fn relative_to(path: &Path, root: &Path) -> PathBuf {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}
