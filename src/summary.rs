//! File Summary Builder (spec §4.4).

use crate::hashing::clamp_by_bytes;

/// Bare prefixes (spec.md §4.4): match on the prefix alone, with no
/// identifier required after it — covers `export { foo };`, `export *
/// from './x';`, and `module.exports = ...` alike.
const BARE_SYMBOL_PREFIXES: &[&str] = &["export ", "module.exports"];

/// Prefixes that require an identifier immediately after them (spec.md
/// §4.4: `class <id>`, `function <id>`, `interface <id>`, `type <id>`).
const IDENTIFIER_SYMBOL_PREFIXES: &[&str] = &["class ", "function ", "interface ", "type "];

const MAX_SYMBOLS: usize = 12;
const FIRST_LINE_CLAMP: usize = 120;
const SYMBOLS_CLAMP: usize = 900;

/// Build a text summary block for a file given its relative path and
/// contents:
///
/// ```text
/// file: <path>
/// lines: <n>
/// first_line: <first non-blank line, truncated to 120 chars>   (if any)
/// symbols: <up to 12 lines matching pattern, joined by " | ", clamped to 900 chars>  (if any)
/// ```
pub fn build_file_summary(relative_path: &str, contents: &str) -> String {
    let lines: Vec<&str> = contents.lines().collect();
    let mut out = format!("file: {relative_path}\nlines: {}", lines.len());

    if let Some(first) = lines.iter().map(|l| l.trim()).find(|l| !l.is_empty()) {
        let clamped = clamp_by_bytes(first, FIRST_LINE_CLAMP);
        out.push_str(&format!("\nfirst_line: {clamped}"));
    }

    let symbols = extract_symbol_lines(&lines);
    if !symbols.is_empty() {
        let joined = symbols.join(" | ");
        let clamped = clamp_by_bytes(&joined, SYMBOLS_CLAMP);
        out.push_str(&format!("\nsymbols: {clamped}"));
    }

    out
}

fn matches_symbol_prefix(trimmed: &str) -> bool {
    if BARE_SYMBOL_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    IDENTIFIER_SYMBOL_PREFIXES.iter().any(|p| {
        trimmed.starts_with(p)
            && trimmed[p.len()..]
                .chars()
                .next()
                .is_some_and(is_identifier_start)
    })
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn extract_symbol_lines<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| matches_symbol_prefix(l))
        .take(MAX_SYMBOLS)
        .collect()
}
