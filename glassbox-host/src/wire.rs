//! Wire types of the generation service the preview consumes.
//!
//! The image-generation endpoint takes a multipart upload and shares the
//! response shape, so only the text request carries a JSON body.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGenerateRequest {
    pub text_description: String,
}

/// Response of both generation endpoints. `jsx_code` is the raw, untrusted
/// component source; `component_name` is only a hint, the normalizer infers
/// the real identifier from the source itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub jsx_code: String,
    pub component_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerateResponse {
    /// The text the preview pipeline ingests.
    pub fn raw_input(&self) -> &str {
        &self.jsx_code
    }
}
