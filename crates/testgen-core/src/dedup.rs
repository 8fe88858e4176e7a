//! Mechanical removal of duplicate test cases.
//!
//! A small C++-aware scanner splits an artifact into test-case blocks and
//! the text between them. A test case is a configured macro name at a word
//! boundary, a balanced `( ... )` header and a balanced `{ ... }` body.
//! String, character and raw-string literals and comments are skipped while
//! scanning, so brackets or macro names inside them never count.

use std::collections::HashSet;

/// Macros recognised when no explicit list is configured.
pub const DEFAULT_TEST_MACROS: &[&str] = &["TEST_CASE", "DROGON_TEST", "TEST", "TEST_F"];

/// A piece of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Anything that is not a complete test case, kept verbatim.
    Text(&'a str),
    /// A test-case block from macro name through closing brace.
    TestCase {
        macro_name: &'a str,
        /// Text between the header parentheses.
        params: &'a str,
        text: &'a str,
    },
}

impl Segment<'_> {
    pub fn text(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::TestCase { text, .. } => text,
        }
    }

    /// Identity of a test case: macro name plus whitespace-collapsed header
    /// parameters. The body plays no part.
    pub fn signature(&self) -> Option<String> {
        match self {
            Segment::Text(_) => None,
            Segment::TestCase {
                macro_name, params, ..
            } => Some(format!(
                "{}({})",
                macro_name,
                params.split_whitespace().collect::<Vec<_>>().join(" ")
            )),
        }
    }
}

/// Removes later test cases whose signature was already seen.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    macros: Vec<String>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Deduplicator::new(DEFAULT_TEST_MACROS.iter().map(|m| m.to_string()).collect())
    }
}

impl Deduplicator {
    pub fn new(macros: Vec<String>) -> Self {
        Deduplicator { macros }
    }

    pub fn macros(&self) -> &[String] {
        &self.macros
    }

    /// Split `code` into text and test-case segments. Concatenating the
    /// segment texts yields `code` exactly.
    pub fn segments<'a>(&self, code: &'a str) -> Vec<Segment<'a>> {
        let bytes = code.as_bytes();
        let mut segments = Vec::new();
        let mut text_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if let Some(end) = skip_literal_or_comment(bytes, i) {
                i = end;
                continue;
            }

            if is_ident_start(bytes[i]) && (i == 0 || !is_ident_byte(bytes[i - 1])) {
                let ident_end = ident_end(bytes, i);
                let ident = &code[i..ident_end];
                if self.macros.iter().any(|m| m == ident) {
                    if let Some((params, block_end)) = parse_test_case(bytes, ident_end) {
                        if text_start < i {
                            segments.push(Segment::Text(&code[text_start..i]));
                        }
                        segments.push(Segment::TestCase {
                            macro_name: ident,
                            params: &code[params.0..params.1],
                            text: &code[i..block_end],
                        });
                        text_start = block_end;
                        i = block_end;
                        continue;
                    }
                }
                i = ident_end;
                continue;
            }

            i += 1;
        }

        if text_start < code.len() {
            segments.push(Segment::Text(&code[text_start..]));
        }
        segments
    }

    /// Keep the first test case per signature and all non-test text, in
    /// input order. Passes repeat until the output stops changing.
    ///
    /// Where dropping a block would join two slashes into a comment, a
    /// newline goes in its place. A duplicate whose removal would still
    /// change how the remaining text scans is kept.
    pub fn dedupe(&self, code: &str) -> String {
        let mut current = self.dedupe_pass(code);
        loop {
            let next = self.dedupe_pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn dedupe_pass(&self, code: &str) -> String {
        let segments = self.segments(code);
        let signatures: Vec<Option<String>> = segments.iter().map(Segment::signature).collect();
        let mut keep = vec![true; segments.len()];
        let mut seen = HashSet::new();

        for (idx, signature) in signatures.iter().enumerate() {
            let Some(sig) = signature else { continue };
            if seen.insert(sig.as_str()) {
                continue;
            }
            keep[idx] = false;
            let expected: Vec<&str> = signatures
                .iter()
                .zip(&keep)
                .filter_map(|(sig, kept)| if *kept { sig.as_deref() } else { None })
                .collect();
            if !self.scans_as(&render(&segments, &keep), &expected) {
                keep[idx] = true;
            }
        }
        render(&segments, &keep)
    }

    /// True when `code` holds exactly the `expected` test cases, in order.
    fn scans_as(&self, code: &str, expected: &[&str]) -> bool {
        let found: Vec<String> = self
            .segments(code)
            .iter()
            .filter_map(Segment::signature)
            .collect();
        found.len() == expected.len() && found.iter().zip(expected).all(|(f, e)| f.as_str() == *e)
    }

    /// Number of distinct test-case signatures in `code`.
    pub fn distinct_signatures(&self, code: &str) -> usize {
        self.segments(code)
            .iter()
            .filter_map(Segment::signature)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Join the kept segments, separating text that would fuse across a gap.
fn render(segments: &[Segment<'_>], keep: &[bool]) -> String {
    let mut out = String::new();
    let mut gap = false;
    for (segment, kept) in segments.iter().zip(keep) {
        if !*kept {
            gap = true;
            continue;
        }
        let text = segment.text();
        if gap && fuses(out.as_bytes().last(), text.as_bytes().first()) {
            out.push('\n');
        }
        gap = false;
        out.push_str(text);
    }
    out
}

/// Whether `left` directly followed by `right` opens a comment. A test
/// case always starts at a word boundary, so identifiers cannot fuse.
fn fuses(left: Option<&u8>, right: Option<&u8>) -> bool {
    matches!((left, right), (Some(&b'/'), Some(&(b'/' | b'*'))))
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    end
}

/// Identifier immediately preceding `pos`, if any.
fn ident_before(bytes: &[u8], pos: usize) -> &[u8] {
    let mut start = pos;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    &bytes[start..pos]
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// If a literal or comment starts at `i`, return the index just past it.
/// Unterminated constructs run to the end of input.
fn skip_literal_or_comment(bytes: &[u8], i: usize) -> Option<usize> {
    match bytes[i] {
        b'/' if bytes.get(i + 1) == Some(&b'/') => {
            let end = bytes[i..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(bytes.len(), |p| i + p);
            Some(end)
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
            let end = bytes[i + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(bytes.len(), |p| i + 2 + p + 2);
            Some(end)
        }
        b'"' => {
            let prefix = ident_before(bytes, i);
            if matches!(prefix, b"R" | b"u8R" | b"uR" | b"UR" | b"LR") {
                Some(skip_raw_string(bytes, i))
            } else {
                Some(skip_quoted(bytes, i, b'"'))
            }
        }
        b'\'' => {
            let prefix = ident_before(bytes, i);
            let char_prefix = matches!(prefix, b"u8" | b"u" | b"U" | b"L");
            // 1'000'000: digit separator, not a literal
            if !char_prefix && i > 0 && bytes[i - 1].is_ascii_alphanumeric() {
                None
            } else {
                Some(skip_quoted(bytes, i, b'\''))
            }
        }
        _ => None,
    }
}

/// Skip a quoted literal starting at `open`, honouring backslash escapes.
/// An unescaped newline also ends it.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Skip `R"delim( ... )delim"` starting at the opening quote.
fn skip_raw_string(bytes: &[u8], quote: usize) -> usize {
    let Some(paren) = bytes[quote + 1..].iter().position(|&b| b == b'(') else {
        return bytes.len();
    };
    let delim = &bytes[quote + 1..quote + 1 + paren];
    let body_start = quote + 1 + paren + 1;

    let mut closing = Vec::with_capacity(delim.len() + 2);
    closing.push(b')');
    closing.extend_from_slice(delim);
    closing.push(b'"');

    bytes[body_start..]
        .windows(closing.len())
        .position(|w| w == closing.as_slice())
        .map_or(bytes.len(), |p| body_start + p + closing.len())
}

/// Index just past the bracket matching the one at `open`, or `None` if
/// it never closes.
fn match_bracket(bytes: &[u8], open: usize, open_b: u8, close_b: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if let Some(end) = skip_literal_or_comment(bytes, i) {
            i = end;
            continue;
        }
        let b = bytes[i];
        if b == open_b {
            depth += 1;
        } else if b == close_b {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

/// Parse `( params ) { body }` after a macro name ending at `after_name`.
/// Returns the params byte range and the index just past the body.
fn parse_test_case(bytes: &[u8], after_name: usize) -> Option<((usize, usize), usize)> {
    let open_paren = skip_whitespace(bytes, after_name);
    if bytes.get(open_paren) != Some(&b'(') {
        return None;
    }
    let header_end = match_bracket(bytes, open_paren, b'(', b')')?;

    let open_brace = skip_whitespace(bytes, header_end);
    if bytes.get(open_brace) != Some(&b'{') {
        return None;
    }
    let block_end = match_bracket(bytes, open_brace, b'{', b'}')?;

    Some(((open_paren + 1, header_end - 1), block_end))
}
