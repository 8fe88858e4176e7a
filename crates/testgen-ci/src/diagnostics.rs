//! Build-log diagnostics.
//!
//! Detection only: findings become advisories for the user, nothing is
//! installed or changed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static MISSING_LIBRARY_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"cannot find -l([\w+.\-]+)").ok());

/// A library the linker could not find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingLibrary {
    /// Library name as passed to `-l`.
    pub name: String,
}

impl MissingLibrary {
    /// Manual-action advice shown on the console and in the report.
    pub fn advisory(&self) -> String {
        format!(
            "Please install the library '{}' manually if the build keeps failing",
            self.name
        )
    }
}

/// Libraries reported missing by linker-style `cannot find -l<name>` lines.
///
/// Each library appears once, in order of first mention.
pub fn missing_libraries(log: &str) -> Vec<MissingLibrary> {
    let Some(re) = MISSING_LIBRARY_RE.as_ref() else {
        return Vec::new();
    };

    let mut found: Vec<MissingLibrary> = Vec::new();
    for caps in re.captures_iter(log) {
        let name = &caps[1];
        if !found.iter().any(|lib| lib.name == name) {
            found.push(MissingLibrary {
                name: name.to_string(),
            });
        }
    }
    found
}

/// First line of a log that looks like an error, for one-line summaries.
pub fn failure_excerpt(log: &str) -> Option<&str> {
    log.lines()
        .map(str::trim)
        .find(|l| {
            let lower = l.to_ascii_lowercase();
            lower.contains("error") || lower.contains("failed") || lower.contains("undefined reference")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_missing_libraries_once_each() {
        let log = "\
/usr/bin/ld: cannot find -lbcrypt: No such file or directory
/usr/bin/ld: cannot find -ljsoncpp
/usr/bin/ld: cannot find -lbcrypt
collect2: error: ld returned 1 exit status";
        let names: Vec<_> = missing_libraries(log).into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["bcrypt", "jsoncpp"]);
    }

    #[test]
    fn test_library_names_with_symbols() {
        let libs = missing_libraries("ld: cannot find -lstdc++");
        assert_eq!(libs[0].name, "stdc++");
    }

    #[test]
    fn test_clean_log_has_no_findings() {
        assert!(missing_libraries("[100%] Built target org_chart").is_empty());
    }

    #[test]
    fn test_advisory_names_library() {
        let lib = MissingLibrary {
            name: "bcrypt".to_string(),
        };
        assert!(lib.advisory().contains("'bcrypt'"));
    }

    #[test]
    fn test_failure_excerpt() {
        let log = "Scanning dependencies\n  test_User.cc:3:10: fatal error: User.h: No such file\nmake: *** [all] Error 2";
        assert_eq!(
            failure_excerpt(log),
            Some("test_User.cc:3:10: fatal error: User.h: No such file")
        );
        assert_eq!(failure_excerpt("all good"), None);
    }
}
