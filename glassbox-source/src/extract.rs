//! Ordered extraction strategies over generated component source.
//!
//! Generative backends misbehave in a small set of predictable ways
//! (JSON-wrapped payloads, missing declarations, lowercase helper bindings),
//! so identifier and field recovery runs as a fixed list of independent
//! strategies. Each strategy returns an optional match; the first success
//! wins.

use regex::Regex;
use std::sync::OnceLock;

/// Default component identifier when no declaration can be recovered.
pub const DEFAULT_IDENTIFIER: &str = "Component";

/// One identifier-inference strategy, ordered by how cleanly the pattern
/// pins down a component declaration. See [`infer_identifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPattern {
    /// `const Name = (` — arrow / function-expression binding.
    ConstArrow,
    /// `const Name =` — any const binding.
    ConstBinding,
    /// `function Name(` — plain declaration.
    FunctionDecl,
    /// `export const Name` / `export function Name`.
    ExportedDecl,
}

impl IdentifierPattern {
    /// Strategies in priority order.
    pub const PRIORITY: [IdentifierPattern; 4] = [
        IdentifierPattern::ConstArrow,
        IdentifierPattern::ConstBinding,
        IdentifierPattern::FunctionDecl,
        IdentifierPattern::ExportedDecl,
    ];

    fn regex(&self) -> &'static Regex {
        match self {
            IdentifierPattern::ConstArrow => {
                static RE: OnceLock<Regex> = OnceLock::new();
                RE.get_or_init(|| Regex::new(r"const\s+(\w+)\s*=\s*\(").unwrap())
            }
            IdentifierPattern::ConstBinding => {
                static RE: OnceLock<Regex> = OnceLock::new();
                RE.get_or_init(|| Regex::new(r"const\s+(\w+)\s*=").unwrap())
            }
            IdentifierPattern::FunctionDecl => {
                static RE: OnceLock<Regex> = OnceLock::new();
                RE.get_or_init(|| Regex::new(r"function\s+(\w+)\s*\(").unwrap())
            }
            IdentifierPattern::ExportedDecl => {
                static RE: OnceLock<Regex> = OnceLock::new();
                RE.get_or_init(|| Regex::new(r"export\s+(?:const|function)\s+(\w+)").unwrap())
            }
        }
    }

    /// First capture in `source`, or nothing. Matches whose first character
    /// is not uppercase are skipped, not adopted — components are
    /// capitalized by convention, lowercase bindings are helpers.
    pub fn extract(&self, source: &str) -> Option<String> {
        let name = self.regex().captures(source)?.get(1)?.as_str();
        if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            Some(name.to_string())
        } else {
            None
        }
    }
}

/// Infer the component identifier from normalized source. Runs the
/// [`IdentifierPattern::PRIORITY`] list, then falls back to any
/// declaration-like token followed by a capitalized identifier. `None`
/// means the caller should use [`DEFAULT_IDENTIFIER`].
pub fn infer_identifier(source: &str) -> Option<String> {
    for pattern in IdentifierPattern::PRIORITY {
        if let Some(name) = pattern.extract(source) {
            return Some(name);
        }
    }
    any_capitalized_declaration(source)
}

fn any_capitalized_declaration(source: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?:const|function|export)\s+([A-Z][a-zA-Z0-9]+)").unwrap());
    re.captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Fields recovered from a corrupt JSON envelope. Values are still escaped
/// exactly as they appeared in the blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeFields {
    pub jsx: Option<String>,
    pub component_name: Option<String>,
}

/// Field-scoped recovery for envelopes whose structural parse failed: pulls
/// the `jsx` and `component_name` values without requiring the whole blob
/// to be valid JSON. Total — a miss just leaves the field `None`.
pub fn extract_envelope_fields(text: &str) -> EnvelopeFields {
    static JSX_RE: OnceLock<Regex> = OnceLock::new();
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let jsx_re = JSX_RE.get_or_init(|| Regex::new(r#"(?s)"jsx"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
    let name_re = NAME_RE.get_or_init(|| Regex::new(r#""component_name"\s*:\s*"([^"]+)""#).unwrap());

    EnvelopeFields {
        jsx: jsx_re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        component_name: name_re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    }
}
