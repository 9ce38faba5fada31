//! Text normalizer: raw generated blob → best-effort component source plus
//! inferred identifier.
//!
//! The pipeline is a fixed ordered chain of independent heuristics. Every
//! stage is total on the string so far — a stage that cannot apply leaves
//! the text unchanged instead of aborting, because generative output is
//! inconsistent in exactly these ways (fenced, JSON-wrapped, double-escaped,
//! missing a clean declaration).

use crate::error::{SourceError, SourceResult};
use crate::escape::unescape_common;
use crate::extract::{extract_envelope_fields, infer_identifier, DEFAULT_IDENTIFIER};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Inferred component name: identifier syntax, uppercase first letter (the
/// case convention that distinguishes components from helper bindings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentIdentifier(String);

impl ComponentIdentifier {
    pub fn parse(name: &str) -> SourceResult<Self> {
        let mut chars = name.chars();
        let head_ok = chars.next().is_some_and(|c| c.is_ascii_uppercase());
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if head_ok && tail_ok {
            Ok(Self(name.to_string()))
        } else {
            Err(SourceError::InvalidIdentifier {
                identifier: name.to_string(),
            })
        }
    }

    /// The fallback name used when inference fails.
    pub fn fallback() -> Self {
        Self(DEFAULT_IDENTIFIER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Component source after normalization. Owned by a single preview request;
/// immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedSource {
    source: String,
    identifier: ComponentIdentifier,
}

impl NormalizedSource {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn identifier(&self) -> &ComponentIdentifier {
        &self.identifier
    }

    /// True when normalization left no executable text at all.
    pub fn is_empty(&self) -> bool {
        self.source.trim().is_empty()
    }
}

/// Normalize a raw generated blob. Total: never fails, never panics; every
/// anomaly degrades to the text so far and, ultimately, to the default
/// identifier.
pub fn normalize(raw: &str) -> NormalizedSource {
    let mut code = strip_fences(raw);
    let mut name_hint: Option<String> = None;

    // JSON envelope (common in image-generated responses)
    if looks_like_json(&code) {
        match serde_json::from_str::<Value>(&code) {
            Ok(Value::Object(map)) => {
                if let Some(Value::String(jsx)) = map.get("jsx") {
                    code = jsx.clone();
                }
                if let Some(Value::String(name)) = map.get("component_name") {
                    name_hint = Some(name.clone());
                }
            }
            Ok(Value::String(inner)) => code = inner,
            Ok(_) => {}
            Err(_) => {
                // Structural parse failed; if the field markers survived,
                // recover just those two fields. A miss here is silent.
                if code.contains("\"jsx\"") && code.contains("\"component_name\"") {
                    let fields = extract_envelope_fields(&code);
                    if let Some(jsx) = fields.jsx {
                        code = unescape_common(&jsx);
                    }
                    if let Some(name) = fields.component_name {
                        name_hint = Some(name);
                    }
                }
            }
        }
    }

    // Escape artifacts from code that transited a JSON string
    if code.contains("\\n") || code.contains("\\\"") {
        code = unescape_common(&code);
    }

    code = strip_export_default(&code);
    code = strip_runtime_imports(&code);
    let code = code.trim().to_string();

    // Own inference takes precedence; the envelope name is only a hint and
    // must still satisfy the identifier convention.
    let identifier = infer_identifier(&code)
        .and_then(|name| ComponentIdentifier::parse(&name).ok())
        .or_else(|| name_hint.and_then(|name| ComponentIdentifier::parse(&name).ok()))
        .unwrap_or_else(ComponentIdentifier::fallback);

    NormalizedSource {
        source: code,
        identifier,
    }
}

fn strip_fences(raw: &str) -> String {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    static BARE: OnceLock<Regex> = OnceLock::new();
    let open = OPEN.get_or_init(|| Regex::new(r"```(?:json|jsx|javascript|typescript|lua)\s*").unwrap());
    let bare = BARE.get_or_init(|| Regex::new(r"(?m)```\s*$").unwrap());

    let code = open.replace_all(raw.trim(), "");
    let code = bare.replace_all(&code, "");
    code.trim().to_string()
}

fn looks_like_json(code: &str) -> bool {
    code.starts_with('{') || (code.starts_with('"') && code.ends_with('"'))
}

fn strip_export_default(code: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"export\s+default\s+").unwrap());
    re.replace_all(code, "").into_owned()
}

/// Remove import statements referencing the host runtime library; the
/// runtime is injected by the document builder instead.
fn strip_runtime_imports(code: &str) -> String {
    static DEFAULT_IMPORT: OnceLock<Regex> = OnceLock::new();
    static NAMED_IMPORT: OnceLock<Regex> = OnceLock::new();
    let default_import =
        DEFAULT_IMPORT.get_or_init(|| Regex::new(r"import\s+React[^;]*from[^;]*;?\s*").unwrap());
    let named_import = NAMED_IMPORT
        .get_or_init(|| Regex::new(r#"import\s*\{[^}]*\}\s*from\s*['"]react['"];?\s*"#).unwrap());

    let code = default_import.replace_all(code, "");
    named_import.replace_all(&code, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parse_rejects_lowercase() {
        assert!(ComponentIdentifier::parse("widget").is_err());
        assert!(ComponentIdentifier::parse("Widget").is_ok());
    }

    #[test]
    fn test_identifier_parse_rejects_non_identifier_chars() {
        assert!(matches!(
            ComponentIdentifier::parse("My-Card"),
            Err(SourceError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_strip_fences_tagged_and_bare() {
        let raw = "```jsx\nconst A = 1;\n```";
        assert_eq!(strip_fences(raw), "const A = 1;");
    }

    #[test]
    fn test_looks_like_json() {
        assert!(looks_like_json("{\"a\":1}"));
        assert!(looks_like_json("\"quoted\""));
        assert!(!looks_like_json("const A = 1;"));
    }

    #[test]
    fn test_strip_runtime_imports_both_forms() {
        let code = "import React from 'react';\nimport { useState } from 'react';\nconst A = 1;";
        assert_eq!(strip_runtime_imports(code), "const A = 1;");
    }
}
