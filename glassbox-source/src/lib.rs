//! # Glassbox source preparation
//!
//! Turns untrusted, structurally inconsistent component source text (as
//! produced by a generative backend) into something the sandbox host can
//! execute safely.
//!
//! ## Features
//! - Total normalization pipeline: markdown fences, JSON envelopes, escape
//!   artifacts and runtime imports are stripped in a fixed order, and every
//!   stage degrades gracefully instead of failing
//! - Identifier inference as an ordered list of extractor strategies
//! - Document builder producing a self-contained, guarded execution chunk
//!
//! ## Example
//! ```ignore
//! use glassbox_source::{normalize, build_document};
//!
//! let raw = r#"```jsx
//! function Greeting()
//!     return h("Text", { text = "hi" })
//! end
//! ```"#;
//!
//! let normalized = normalize(raw);
//! assert_eq!(normalized.identifier().as_str(), "Greeting");
//! let document = build_document(&normalized);
//! ```

pub mod document;
pub mod error;
pub mod escape;
pub mod extract;
pub mod normalize;

pub use document::{build_document, ExecutionDocument, ERROR_MARKER, STACK_TRACE_LIMIT};
pub use error::{SourceError, SourceResult};
pub use escape::{escape_embedded, unescape_common, unescape_embedded};
pub use extract::{infer_identifier, EnvelopeFields, IdentifierPattern, DEFAULT_IDENTIFIER};
pub use normalize::{normalize, ComponentIdentifier, NormalizedSource};

/// Normalize raw text and build its execution document in one step.
pub fn prepare(raw: &str) -> ExecutionDocument {
    build_document(&normalize(raw))
}
