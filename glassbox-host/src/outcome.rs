//! Outcome model and post-load mount inspection.

use glassbox_source::ERROR_MARKER;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Observable state of one preview request. Transitions are monotonic per
/// settled episode: once `Success` or `Error` is published for a given
/// input, the host will not recompute for the same input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Loading,
    Success,
    Error(String),
}

impl Outcome {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Outcome::Loading)
    }
}

/// Snapshot of the execution document's mount point, written by the report
/// callback inside the sandbox and read by the detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountSnapshot {
    /// Number of element children attached to the mount (0 or 1).
    pub children: u32,
    /// Serialized markup of the mounted tree.
    pub markup: String,
}

/// Shared handle to the latest mount snapshot. `None` until the document
/// reports for the first time.
pub type SharedSnapshot = Arc<Mutex<Option<MountSnapshot>>>;

/// What one look at the mount concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    /// Visible content present.
    Populated,
    /// No element children and no non-whitespace text; worth a re-check.
    Empty,
    /// The structured error marker (or visible error text) was found.
    Failed(String),
    /// The mount could not be inspected across the isolation boundary;
    /// absence of an observable failure is treated as success.
    Unverifiable,
}

pub struct OutcomeDetector {
    excerpt_limit: usize,
}

impl OutcomeDetector {
    pub fn new(excerpt_limit: usize) -> Self {
        Self { excerpt_limit }
    }

    /// Classify one look at the mount. Runs once after the settle delay;
    /// the host schedules a second call for `Empty` results.
    pub fn inspect(&self, snapshot: &SharedSnapshot) -> Inspection {
        let guard = match snapshot.lock() {
            Ok(guard) => guard,
            Err(_) => return Inspection::Unverifiable,
        };
        let Some(snap) = guard.as_ref() else {
            return Inspection::Unverifiable;
        };

        let visible = visible_text(&snap.markup);
        if snap.markup.contains(ERROR_MARKER) || visible.contains("Error:") {
            return Inspection::Failed(format!(
                "rendering error: {}...",
                excerpt(visible.trim(), self.excerpt_limit)
            ));
        }
        if snap.children == 0 && visible.trim().is_empty() {
            return Inspection::Empty;
        }
        Inspection::Populated
    }
}

/// Text content of the markup with tags stripped and the basic entities
/// decoded — the equivalent of reading `textContent` off the mount.
fn visible_text(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn excerpt(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
