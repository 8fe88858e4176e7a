//! testgen-ci: native toolchain adapters for testgen
//!
//! Runs the project's build, test and coverage commands and reports what
//! they said:
//! - `BuildRunner` builds, then tests, from the project root
//! - `CoverageCollector` runs the coverage tool once per tracked file
//! - `diagnostics` spots missing libraries in build logs

pub mod build;
pub mod coverage;
pub mod diagnostics;
mod error;
pub mod fakes;
pub mod runner;
pub mod stage;

// Re-export key types
pub use build::{BuildAttempt, BuildCommands, BuildRunner, BuildTool};
pub use coverage::{CoverageCollector, CoverageEntry, CoverageReport, CoverageTool};
pub use diagnostics::{failure_excerpt, missing_libraries, MissingLibrary};
pub use error::{CiError, Result};
pub use runner::{CommandRunner, StageResult};
pub use stage::{BuiltinStage, StageConfig};
