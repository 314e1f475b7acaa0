//! AI call wrapper - one named sub-task, one backend invocation.
//!
//! Turns a [`TaskSpec`] into exactly one remote generation call and
//! normalizes the outcome: a schema-enforced payload is trusted as-is, a
//! raw text response is run through the extractor, and every failure is
//! annotated with the sub-task name. No state is retained between calls.

use crate::error::AiError;
use crate::extract::extract_json;
use crate::provider::{GenerateRequest, GenerativeBackend, PartData, Role, Turn};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use huduma_common::config::AiConfig;
use serde_json::Value;
use std::sync::Arc;

/// Description of one AI-backed sub-task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Sub-task name, used for error annotation and logging.
    pub name: &'static str,
    /// Prompt text.
    pub prompt: String,
    /// Optional binary attachment (uploaded photo, document scan).
    pub attachment: Option<Attachment>,
    /// JSON Schema directive for enforced output.
    pub schema: Option<Value>,
    /// Enable web-grounding tools for this call.
    pub grounding: bool,
}

/// Binary payload attached to a task.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl TaskSpec {
    pub fn new(name: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            name,
            prompt: prompt.into(),
            attachment: None,
            schema: None,
            grounding: false,
        }
    }

    /// Request schema-enforced output.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Attach a binary payload.
    pub fn with_attachment(mut self, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.attachment = Some(Attachment {
            mime_type: mime_type.into(),
            bytes,
        });
        self
    }

    /// Enable web grounding.
    pub fn with_grounding(mut self) -> Self {
        self.grounding = true;
        self
    }
}

/// Stateless dispatcher for AI-backed sub-tasks.
#[derive(Clone)]
pub struct AiService {
    backend: Arc<dyn GenerativeBackend>,
    config: AiConfig,
}

impl AiService {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: AiConfig) -> Self {
        Self { backend, config }
    }

    /// The backend this service dispatches to.
    pub fn backend(&self) -> Arc<dyn GenerativeBackend> {
        Arc::clone(&self.backend)
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Run a sub-task expecting a JSON value.
    ///
    /// If the backend enforced the requested schema, its payload is
    /// returned without re-extraction; otherwise the raw text is passed
    /// through [`extract_json`]. Any failure is wrapped as
    /// [`AiError::Task`] carrying the sub-task name.
    pub async fn call_structured(&self, spec: TaskSpec) -> Result<Value, AiError> {
        let name = spec.name;
        self.structured_inner(spec)
            .await
            .map_err(|e| e.for_task(name))
    }

    async fn structured_inner(&self, spec: TaskSpec) -> Result<Value, AiError> {
        let request = self.build_request(&spec);
        let response = self.backend.generate(request).await?;

        if let Some(value) = response.structured {
            return Ok(value);
        }
        Ok(extract_json(&response.text)?)
    }

    /// Run a sub-task expecting plain text; returns the trimmed response.
    pub async fn call_text(&self, spec: TaskSpec) -> Result<String, AiError> {
        let name = spec.name;
        let request = self.build_request(&spec);
        let response = self
            .backend
            .generate(request)
            .await
            .map_err(|e| e.for_task(name))?;
        Ok(response.text.trim().to_string())
    }

    fn build_request(&self, spec: &TaskSpec) -> GenerateRequest {
        let mut parts = vec![PartData::Text(spec.prompt.clone())];
        if let Some(attachment) = &spec.attachment {
            parts.push(PartData::InlineData {
                mime_type: attachment.mime_type.clone(),
                data: BASE64.encode(&attachment.bytes),
            });
        }

        tracing::debug!(
            task = spec.name,
            schema = spec.schema.is_some(),
            grounding = spec.grounding,
            attachment = spec.attachment.is_some(),
            "dispatching sub-task"
        );

        GenerateRequest {
            model: self.config.model.clone(),
            system: None,
            turns: vec![Turn {
                role: Role::User,
                parts,
            }],
            response_schema: spec.schema.clone(),
            grounding: spec.grounding,
            temperature: Some(self.config.temperature),
            max_output_tokens: Some(self.config.max_output_tokens),
        }
    }
}
