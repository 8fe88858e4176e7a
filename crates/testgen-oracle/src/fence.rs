//! Fenced code block recognition.
//!
//! Oracle responses are free text that may wrap code in one or more
//! backtick fences. Blocks are recognised structurally, line by line: an
//! opening fence carries an optional language tag, and a block only closes
//! on a bare fence at least as long as its opener, so a tagged fence inside
//! a block never terminates it.

/// A line consisting only of a backtick fence and an optional language tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceMarker<'a> {
    /// Number of backticks in the fence.
    pub ticks: usize,
    /// Language tag following the fence (may be empty).
    pub info: &'a str,
}

impl FenceMarker<'_> {
    fn closes(&self, opener_ticks: usize) -> bool {
        self.info.is_empty() && self.ticks >= opener_ticks
    }
}

/// Parse `line` as a fence marker.
///
/// Returns `None` for anything that is not a bare fence: fewer than three
/// backticks, text after the tag, or backticks inside the tag.
pub fn fence_marker(line: &str) -> Option<FenceMarker<'_>> {
    let trimmed = line.trim();
    let ticks = trimmed.bytes().take_while(|b| *b == b'`').count();
    if ticks < 3 {
        return None;
    }

    let info = trimmed[ticks..].trim();
    let is_tag = info
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '#' | '.' | '_'));
    if !is_tag {
        return None;
    }

    Some(FenceMarker { ticks, info })
}

/// Return the body of the first block tagged `tag` (case-insensitive).
///
/// A block left open at the end of the text (truncated response) yields
/// everything after its opener.
pub fn extract_tagged_block(text: &str, tag: &str) -> Option<String> {
    // (opener ticks, whether this block is the one we want)
    let mut open: Option<(usize, bool)> = None;
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        match open {
            None => {
                if let Some(marker) = fence_marker(line) {
                    open = Some((marker.ticks, marker.info.eq_ignore_ascii_case(tag)));
                }
            }
            Some((ticks, wanted)) => {
                if fence_marker(line).is_some_and(|m| m.closes(ticks)) {
                    if wanted {
                        return Some(body.join("\n").trim().to_string());
                    }
                    open = None;
                    continue;
                }
                if wanted {
                    body.push(line);
                }
            }
        }
    }

    match open {
        Some((_, true)) => Some(body.join("\n").trim().to_string()),
        _ => None,
    }
}

/// Extract the first `tag` block, or return the whole response unchanged.
pub fn extract_code(text: &str, tag: &str) -> String {
    extract_tagged_block(text, tag).unwrap_or_else(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_marker_parsing() {
        assert_eq!(
            fence_marker("```cpp"),
            Some(FenceMarker {
                ticks: 3,
                info: "cpp"
            })
        );
        assert_eq!(
            fence_marker("  ````  "),
            Some(FenceMarker { ticks: 4, info: "" })
        );
        assert!(fence_marker("``cpp").is_none());
        assert!(fence_marker("```cpp int x = 1;").is_none());
        assert!(fence_marker("int x; // ```").is_none());
        assert!(fence_marker("```a```").is_none());
    }

    #[test]
    fn test_first_of_two_tagged_blocks_wins() {
        let text = "Here you go:\n```cpp\nint a = 1;\n```\nAnd also:\n```cpp\nint b = 2;\n```\n";
        assert_eq!(extract_code(text, "cpp"), "int a = 1;");
    }

    #[test]
    fn test_untagged_response_is_returned_whole() {
        let text = "int main() { return 0; }\n";
        assert_eq!(extract_code(text, "cpp"), text);
    }

    #[test]
    fn test_other_language_block_is_skipped() {
        let text = "```text\n```cpp inside text\n```\n```cpp\nreal();\n```";
        assert_eq!(extract_code(text, "cpp"), "real();");
    }

    #[test]
    fn test_tag_match_is_case_insensitive() {
        let text = "```CPP\nx();\n```";
        assert_eq!(extract_tagged_block(text, "cpp").as_deref(), Some("x();"));
    }

    #[test]
    fn test_truncated_block_yields_remaining_text() {
        let text = "```cpp\nTEST_CASE(a) {\n  CHECK(true);\n";
        assert_eq!(
            extract_tagged_block(text, "cpp").as_deref(),
            Some("TEST_CASE(a) {\n  CHECK(true);")
        );
    }

    #[test]
    fn test_nested_tagged_fence_does_not_close_block() {
        let text = "````cpp\nauto doc = R\"(\n```python\n)\";\n````";
        assert_eq!(
            extract_tagged_block(text, "cpp").as_deref(),
            Some("auto doc = R\"(\n```python\n)\";")
        );
    }

    #[test]
    fn test_short_closer_does_not_close_long_fence() {
        let text = "````cpp\na();\n```\nb();\n````";
        assert_eq!(
            extract_tagged_block(text, "cpp").as_deref(),
            Some("a();\n```\nb();")
        );
    }
}
