//! Provider profile generation.
//!
//! Turns a provider's free-text self-description into the structured
//! listing copy the marketplace renders. This is a direct caller with no
//! fallback: a failed generation propagates to the caller, which reports
//! it to the provider instead of publishing a half-built profile.

use crate::call::{AiService, TaskSpec};
use crate::error::AiError;
use serde::{Deserialize, Serialize};
use serde_json::json;

const TASK: &str = "provider_profile";

/// Structured listing copy for a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Two-to-three sentence biography in the third person.
    pub bio: String,
    /// One-line tagline for search results.
    pub tagline: String,
    /// Normalized skill labels.
    pub skills: Vec<String>,
}

fn profile_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "bio": {"type": "string"},
            "tagline": {"type": "string"},
            "skills": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["bio", "tagline", "skills"]
    })
}

fn profile_prompt(raw_description: &str) -> String {
    format!(
        "A service provider wrote this about themselves:\n\n{raw_description}\n\n\
         Write their marketplace listing as JSON with keys bio (2-3 \
         sentences, third person), tagline (under 10 words), and skills (a \
         list of short normalized skill labels). Keep every claim grounded \
         in what they wrote; do not invent qualifications."
    )
}

/// Generate listing copy from a provider's own description.
pub async fn generate_provider_profile(
    ai: &AiService,
    raw_description: &str,
) -> Result<ProviderProfile, AiError> {
    let value = ai
        .call_structured(
            TaskSpec::new(TASK, profile_prompt(raw_description)).with_schema(profile_schema()),
        )
        .await?;

    serde_json::from_value(value).map_err(|e| AiError::Json(e).for_task(TASK))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FragmentStream, GenerateRequest, GenerateResponse, GenerativeBackend};
    use async_trait::async_trait;
    use huduma_common::config::AiConfig;
    use std::sync::Arc;

    struct FixedBackend(&'static str);

    #[async_trait]
    impl GenerativeBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, AiError> {
            let structured = request
                .response_schema
                .as_ref()
                .and_then(|_| serde_json::from_str(self.0).ok());
            Ok(GenerateResponse {
                text: self.0.to_string(),
                structured,
            })
        }

        async fn generate_stream(
            &self,
            _request: GenerateRequest,
        ) -> Result<FragmentStream, AiError> {
            Err(AiError::remote("not streamable"))
        }
    }

    #[tokio::test]
    async fn parses_generated_profile() {
        let backend = FixedBackend(
            r#"{"bio": "Amina repairs phones.", "tagline": "Fast phone repairs", "skills": ["phone repair"]}"#,
        );
        let ai = AiService::new(Arc::new(backend), AiConfig::default());
        let profile = generate_provider_profile(&ai, "I fix phones quickly")
            .await
            .unwrap();
        assert_eq!(profile.tagline, "Fast phone repairs");
        assert_eq!(profile.skills, vec!["phone repair"]);
    }

    #[tokio::test]
    async fn shape_mismatch_propagates_as_typed_error() {
        // Valid JSON, wrong shape: skills is a string
        let backend =
            FixedBackend(r#"{"bio": "b", "tagline": "t", "skills": "welding"}"#);
        let ai = AiService::new(Arc::new(backend), AiConfig::default());
        let err = generate_provider_profile(&ai, "I weld").await.unwrap_err();
        match err {
            AiError::Task { task, source } => {
                assert_eq!(task, TASK);
                assert!(matches!(*source, AiError::Json(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
