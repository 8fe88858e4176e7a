//! Instruction texts sent to the oracle at each stage.
//!
//! Each text is read verbatim from a file in the instructions directory. A
//! missing file falls back to a built-in default so a fresh checkout can run
//! without any setup.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TestgenError};

/// Which pipeline step an instruction drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Initial,
    Refactor,
    Deduplicate,
    FixBuild,
    AddLibraries,
    FinalRefinement,
    Uncovered,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 7] = [
        InstructionKind::Initial,
        InstructionKind::Refactor,
        InstructionKind::Deduplicate,
        InstructionKind::FixBuild,
        InstructionKind::AddLibraries,
        InstructionKind::FinalRefinement,
        InstructionKind::Uncovered,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            InstructionKind::Initial => "initial_prompt.yaml",
            InstructionKind::Refactor => "refactor_prompt.yaml",
            InstructionKind::Deduplicate => "deduplicate_prompt.yaml",
            InstructionKind::FixBuild => "fix_build_prompt.yaml",
            InstructionKind::AddLibraries => "add_libraries_prompt.yaml",
            InstructionKind::FinalRefinement => "final_refinement_prompt.yaml",
            InstructionKind::Uncovered => "uncovered_prompt.yaml",
        }
    }

    pub fn default_text(&self) -> &'static str {
        match self {
            InstructionKind::Initial => DEFAULT_INITIAL,
            InstructionKind::Refactor => DEFAULT_REFACTOR,
            InstructionKind::Deduplicate => DEFAULT_DEDUPLICATE,
            InstructionKind::FixBuild => DEFAULT_FIX_BUILD,
            InstructionKind::AddLibraries => DEFAULT_ADD_LIBRARIES,
            InstructionKind::FinalRefinement => DEFAULT_FINAL_REFINEMENT,
            InstructionKind::Uncovered => DEFAULT_UNCOVERED,
        }
    }
}

/// Where an instruction text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionSource {
    File,
    BuiltIn,
}

/// One text per `InstructionKind`.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    texts: HashMap<InstructionKind, (String, InstructionSource)>,
}

impl Default for InstructionSet {
    fn default() -> Self {
        InstructionSet {
            texts: InstructionKind::ALL
                .iter()
                .map(|k| (*k, (k.default_text().to_string(), InstructionSource::BuiltIn)))
                .collect(),
        }
    }
}

impl InstructionSet {
    /// Load every instruction from `dir`, falling back per file.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut set = InstructionSet::default();
        for kind in InstructionKind::ALL {
            let path = dir.join(kind.file_name());
            if !path.is_file() {
                debug!(file = kind.file_name(), "using built-in instruction");
                continue;
            }
            let text =
                std::fs::read_to_string(&path).map_err(|e| TestgenError::file_io(&path, e))?;
            set.texts.insert(kind, (text, InstructionSource::File));
        }
        Ok(set)
    }

    pub fn get(&self, kind: InstructionKind) -> &str {
        self.texts
            .get(&kind)
            .map(|(text, _)| text.as_str())
            .unwrap_or_else(|| kind.default_text())
    }

    pub fn source(&self, kind: InstructionKind) -> InstructionSource {
        self.texts
            .get(&kind)
            .map(|(_, source)| *source)
            .unwrap_or(InstructionSource::BuiltIn)
    }

    /// Replace one text; used by callers that assemble instructions in code.
    pub fn with_text(mut self, kind: InstructionKind, text: impl Into<String>) -> Self {
        self.texts.insert(kind, (text.into(), InstructionSource::File));
        self
    }
}

const DEFAULT_INITIAL: &str = "\
task: generate_unit_tests
rules:
  - Write unit tests for every public function and method in the given source file.
  - Use the Drogon test framework (DROGON_TEST / CHECK / REQUIRE).
  - Cover normal inputs, boundary values and error paths.
  - Include every header the tests need; do not invent project headers.
  - Give each test case a unique, descriptive name.
  - Output a single complete C++ file and nothing else.
";

const DEFAULT_REFACTOR: &str = "\
task: refactor_for_testability
rules:
  - Keep behaviour identical.
  - Extract hard-wired dependencies behind parameters or small interfaces where that makes code testable.
  - Do not rename public functions or change their signatures.
  - Output the complete refactored C++ file and nothing else.
";

const DEFAULT_DEDUPLICATE: &str = "\
task: remove_duplicate_tests
rules:
  - Remove test cases that check the same behaviour as an earlier test case.
  - Keep the first occurrence of each duplicate and preserve the order of the rest.
  - Merge duplicate includes.
  - Output the complete C++ test file and nothing else.
";

const DEFAULT_FIX_BUILD: &str = "\
task: fix_build_errors
rules:
  - The input is the current test code followed by the build and test log.
  - Fix every compile, link and test failure shown in the log.
  - Correct include paths and missing declarations rather than deleting tests.
  - Output the corrected C++ test code and nothing else.
";

const DEFAULT_ADD_LIBRARIES: &str = "\
task: add_missing_includes
rules:
  - Read the build log below and add any missing #include directives or using declarations.
  - Do not change test logic.
  - Output the complete C++ test file and nothing else.
";

const DEFAULT_FINAL_REFINEMENT: &str = "\
task: refine_with_coverage
rules:
  - Use the coverage report below to strengthen tests for partially covered code.
  - Remove redundant or always-passing assertions.
  - Keep every passing test that still adds coverage.
  - Output the complete C++ test file and nothing else.
";

const DEFAULT_UNCOVERED: &str = "\
task: tests_for_uncovered_code
rules:
  - Use the coverage report below to find lines and branches that no test executes.
  - Write new test cases only for that uncovered code.
  - Do not repeat existing test cases or includes.
  - Output only the new C++ test cases.
";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_names_are_distinct() {
        let mut names: Vec<_> = InstructionKind::ALL.iter().map(|k| k.file_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), InstructionKind::ALL.len());
    }

    #[test]
    fn test_missing_directory_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let set = InstructionSet::load(&dir.path().join("absent")).unwrap();
        for kind in InstructionKind::ALL {
            assert_eq!(set.get(kind), kind.default_text());
            assert_eq!(set.source(kind), InstructionSource::BuiltIn);
        }
    }

    #[test]
    fn test_file_overrides_default_verbatim() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fix_build_prompt.yaml"), "fix: it\n").unwrap();

        let set = InstructionSet::load(dir.path()).unwrap();
        assert_eq!(set.get(InstructionKind::FixBuild), "fix: it\n");
        assert_eq!(set.source(InstructionKind::FixBuild), InstructionSource::File);
        assert_eq!(
            set.get(InstructionKind::Initial),
            InstructionKind::Initial.default_text()
        );
    }
}
