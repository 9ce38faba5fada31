//! Escape pair for embedding component source inside the execution
//! document's string literal, plus the unescaper for generator artifacts.
//!
//! Both directions run as a single left-to-right scan with backslash
//! handling first, so no sequence is ever double-processed.

/// Escape `source` for embedding inside the harness's double-quoted Luau
/// string literal. Backslashes first, then the embedding delimiter, then
/// line endings (`\r\n` and bare `\r` normalize to a single `\n`) encoded
/// as the two-character escape so the literal stays on one line.
pub fn escape_embedded(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Exact inverse of [`escape_embedded`]. Unknown escapes are kept verbatim
/// so a stray backslash cannot make the round trip lossy.
pub fn unescape_embedded(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Unescape the artifacts generators leave behind when code transits a JSON
/// string: `\\`, `\n`, `\"`, `\'`, `\t`, `\r`.
pub fn unescape_common(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
