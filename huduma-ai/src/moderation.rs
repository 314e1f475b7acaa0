//! Image verification for provider uploads.
//!
//! Providers upload ID photos and work samples; this module asks the
//! backend whether an image is acceptable for the marketplace. Like
//! profile generation this is a direct caller: there is no sensible
//! default for "is this photo acceptable", so failures propagate.

use crate::call::{AiService, TaskSpec};
use crate::error::AiError;
use serde::{Deserialize, Serialize};
use serde_json::json;

const TASK: &str = "verify_image";

/// Verdict on an uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageVerification {
    /// Whether the image may be published on the marketplace.
    pub acceptable: bool,
    /// Human-readable reason, surfaced to the provider on rejection.
    pub reason: String,
}

fn verification_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "acceptable": {"type": "boolean"},
            "reason": {"type": "string"}
        },
        "required": ["acceptable", "reason"]
    })
}

const VERIFICATION_PROMPT: &str =
    "You are reviewing an image uploaded to a services marketplace as a \
     provider photo or work sample. Decide whether it is acceptable: it \
     must be a clear, safe-for-work photo relevant to offering a service \
     (a person, a workspace, tools, or completed work). Respond as JSON \
     with keys acceptable (boolean) and reason (one sentence).";

/// Verify an uploaded provider image.
pub async fn verify_provider_image(
    ai: &AiService,
    mime_type: &str,
    bytes: Vec<u8>,
) -> Result<ImageVerification, AiError> {
    let value = ai
        .call_structured(
            TaskSpec::new(TASK, VERIFICATION_PROMPT)
                .with_attachment(mime_type, bytes)
                .with_schema(verification_schema()),
        )
        .await?;

    serde_json::from_value(value).map_err(|e| AiError::Json(e).for_task(TASK))
}
