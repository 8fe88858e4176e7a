//! Normalization of oracle output into compilable artifact text.
//!
//! Three passes, in order: drop code-fence markers, rewrite include paths
//! from their local form to the form that resolves from the staging
//! directory, trim surrounding whitespace. `normalize` is idempotent; the
//! rewrite table is validated at construction so that no replacement can
//! reintroduce a local pattern.

use serde::{Deserialize, Serialize};
use testgen_oracle::fence;

use crate::error::{Result, TestgenError};

const FENCE: &str = "```";

/// One local → relocated replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub local: String,
    pub relocated: String,
}

impl RewriteRule {
    pub fn new(local: impl Into<String>, relocated: impl Into<String>) -> Self {
        RewriteRule {
            local: local.into(),
            relocated: relocated.into(),
        }
    }
}

/// Validated, ordered set of rewrite rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTable {
    rules: Vec<RewriteRule>,
}

impl RewriteTable {
    /// Build a table, rejecting rules that would break idempotence.
    pub fn new(rules: Vec<RewriteRule>) -> Result<Self> {
        for rule in &rules {
            let reject = |reason: &str| TestgenError::InvalidRewriteRule {
                local: rule.local.clone(),
                relocated: rule.relocated.clone(),
                reason: reason.to_string(),
            };

            if rule.local.is_empty() || rule.relocated.is_empty() {
                return Err(reject("patterns must not be empty"));
            }
            if rule.local.contains('`') || rule.relocated.contains('`') {
                return Err(reject("patterns must not contain backticks"));
            }
            if let Some(other) = rules
                .iter()
                .find(|other| can_recreate(&rule.relocated, &other.local))
            {
                return Err(reject(&format!(
                    "relocated text can recreate local pattern {:?}",
                    other.local
                )));
            }
        }
        Ok(RewriteTable { rules })
    }

    pub fn empty() -> Self {
        RewriteTable { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Apply every rule once, in table order.
    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| acc.replace(&rule.local, &rule.relocated))
    }
}

impl Default for RewriteTable {
    fn default() -> Self {
        RewriteTable {
            rules: default_rewrite_rules(),
        }
    }
}

/// Whether inserting `relocated` into any text could leave an occurrence of
/// `local` behind: one contains the other, or they overlap at either edge.
fn can_recreate(relocated: &str, local: &str) -> bool {
    if relocated.contains(local) || local.contains(relocated) {
        return true;
    }
    (1..local.len()).any(|n| {
        let head_overlap = local.is_char_boundary(n) && relocated.ends_with(&local[..n]);
        let tail_overlap =
            local.is_char_boundary(local.len() - n) && relocated.starts_with(&local[local.len() - n..]);
        head_overlap || tail_overlap
    })
}

/// Include rewrites for a Drogon project whose tests are staged two levels
/// below the project root.
pub fn default_rewrite_rules() -> Vec<RewriteRule> {
    const BCRYPT: &str = "#include \"../../third_party/libbcrypt/include/bcrypt/BCrypt.hpp\"";
    const JWT: &str = "#include \"../../plugins/JwtPlugin.h\"";

    let mut rules = vec![
        RewriteRule::new("#include <bcrypt/BCrypt.hpp>", BCRYPT),
        RewriteRule::new("#include \"bcrypt/BCrypt.hpp\"", BCRYPT),
        RewriteRule::new("#include \"../plugins/JwtPlugin.h\"", JWT),
        RewriteRule::new("#include \"JwtPlugin.h\"", JWT),
    ];

    let relocated = [
        ("controllers", "AuthController.h"),
        ("models", "User.h"),
        ("models", "Department.h"),
        ("models", "Job.h"),
        ("models", "Person.h"),
        ("models", "PersonInfo.h"),
        ("controllers", "DepartmentsController.h"),
        ("controllers", "JobsController.h"),
        ("controllers", "PersonsController.h"),
        ("utils", "utils.h"),
    ];
    rules.extend(relocated.iter().map(|(dir, header)| {
        RewriteRule::new(
            format!("#include \"{header}\""),
            format!("#include \"../../{dir}/{header}\""),
        )
    }));
    rules
}

/// Remove every code-fence marker from `text`.
///
/// Lines that are nothing but a fence (optionally tagged) are dropped whole;
/// any triple backticks left inside other lines are then removed until none
/// remain.
pub fn strip_fences(text: &str) -> String {
    let mut out: String = text
        .split_inclusive('\n')
        .filter(|line| fence::fence_marker(line).is_none())
        .collect();

    while out.contains(FENCE) {
        out = out.replace(FENCE, "");
    }
    out
}

/// Turns raw oracle text into artifact text.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    table: RewriteTable,
}

impl Normalizer {
    pub fn new(table: RewriteTable) -> Self {
        Normalizer { table }
    }

    pub fn table(&self) -> &RewriteTable {
        &self.table
    }

    pub fn normalize(&self, raw: &str) -> String {
        let unfenced = strip_fences(raw);
        self.table.apply(&unfenced).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let table = RewriteTable::new(default_rewrite_rules()).unwrap();
        assert_eq!(table.rules().len(), 14);
    }

    #[test]
    fn test_every_default_rule_relocates() {
        let table = RewriteTable::default();
        for rule in table.rules() {
            let input = format!("// header\n{}\nint x;\n", rule.local);
            let output = table.apply(&input);
            assert!(output.contains(&rule.relocated), "{}", rule.local);
            assert!(!output.contains(&rule.local), "{}", rule.local);
        }
    }

    #[test]
    fn test_rule_whose_output_contains_a_local_pattern_is_rejected() {
        let rules = vec![
            RewriteRule::new("#include \"User.h\"", "#include \"../../models/User.h\""),
            RewriteRule::new("#include \"Old.h\"", "#include \"User.h\""),
        ];
        assert!(matches!(
            RewriteTable::new(rules),
            Err(TestgenError::InvalidRewriteRule { .. })
        ));
    }

    #[test]
    fn test_overlapping_rule_is_rejected() {
        // "ab" -> "xa" turns "abb" into "xab", recreating "ab".
        let rules = vec![RewriteRule::new("ab", "xa")];
        assert!(RewriteTable::new(rules).is_err());
    }

    #[test]
    fn test_empty_pattern_is_rejected() {
        assert!(RewriteTable::new(vec![RewriteRule::new("", "x")]).is_err());
        assert!(RewriteTable::new(vec![RewriteRule::new("x", "")]).is_err());
    }

    #[test]
    fn test_strip_fences_removes_marker_lines_and_inline_fences() {
        let raw = "```cpp\n#include <x>\n```\nint a; ```\n```\n";
        assert_eq!(strip_fences(raw), "#include <x>\nint a; \n");
    }

    #[test]
    fn test_strip_fences_collapses_long_backtick_runs() {
        assert_eq!(strip_fences("a ``````` b"), "a ` b");
        assert!(!strip_fences("a ``` ``` `````` b").contains(FENCE));
    }

    #[test]
    fn test_normalize_full_response() {
        let normalizer = Normalizer::default();
        let raw = "\n```cpp\n#include \"User.h\"\n#include <drogon/drogon.h>\n\nDROGON_TEST(UserId) {}\n```\n\n";
        assert_eq!(
            normalizer.normalize(raw),
            "#include \"../../models/User.h\"\n#include <drogon/drogon.h>\n\nDROGON_TEST(UserId) {}"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = Normalizer::default();
        let samples = [
            "",
            "   \n\t",
            "```",
            "````cpp\n```\n````",
            "```cpp\n#include \"JwtPlugin.h\"\n#include \"../plugins/JwtPlugin.h\"\n```",
            "text ```` more ``` `` ` end",
            "#include <bcrypt/BCrypt.hpp>\n#include \"bcrypt/BCrypt.hpp\"\r\n```\r\n",
            "  ```\nTEST_CASE(\"a\") { CHECK(1 == 1); }\n```  \n#include \"utils.h\"",
            "#include \"#include \"User.h\"\"",
        ];
        for sample in samples {
            let once = normalizer.normalize(sample);
            assert_eq!(normalizer.normalize(&once), once, "input: {sample:?}");
        }
    }

    #[test]
    fn test_two_tagged_blocks_both_lose_fences() {
        let normalizer = Normalizer::new(RewriteTable::empty());
        let raw = "```cpp\nint a;\n```\n```cpp\nint b;\n```";
        assert_eq!(normalizer.normalize(raw), "int a;\nint b;");
    }
}
