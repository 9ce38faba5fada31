//! Preview configuration. All delays are tunables, not correctness bounds:
//! the empty re-check in particular cannot distinguish "still mounting"
//! from "intentionally renders nothing".

use crate::context::LUA_MEMORY_LIMIT_BYTES;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Wait after load completion before classifying the outcome, to
    /// absorb asynchronous rendering inside the sandbox.
    pub settle_delay_ms: u64,
    /// Delay before the second look at a mount that appeared empty.
    pub empty_recheck_delay_ms: u64,
    /// Absolute bound: if neither the load nor the error observer fires
    /// within this window, the episode settles as timed out.
    pub load_timeout_ms: u64,
    /// In-VM execution deadline, enforced from the interrupt so a hot loop
    /// inside the guarded block is still bounded.
    pub execution_budget_ms: u64,
    /// Lua heap limit for the preview VM.
    pub lua_memory_limit_bytes: usize,
    /// Visible error text is truncated to this many chars in the outcome.
    pub error_excerpt_limit: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            empty_recheck_delay_ms: 1000,
            load_timeout_ms: 15_000,
            execution_budget_ms: 10_000,
            lua_memory_limit_bytes: LUA_MEMORY_LIMIT_BYTES,
            error_excerpt_limit: 150,
        }
    }
}

impl PreviewConfig {
    /// Parse from YAML. Missing fields fall back to the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        serde_yaml::from_str(text).map_err(|e| format!("parse preview config: {}", e))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("read {}: {}", path.display(), e))?;
        Self::from_yaml(&text)
    }
}
