//! Generative backend abstraction.
//!
//! Provides a capability-neutral interface to the remote generation API:
//! one-shot generation (optionally schema-enforced or tool-grounded) and
//! streaming generation delivering incremental text fragments.

mod gemini;

pub use gemini::GeminiClient;

use crate::error::AiError;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Role of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One piece of turn content: text or inline binary data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartData {
    Text(String),
    /// Base64-encoded payload with its MIME type (e.g. an uploaded photo).
    InlineData {
        mime_type: String,
        data: String,
    },
}

/// A conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<PartData>,
}

impl Turn {
    /// A plain-text user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![PartData::Text(text.into())],
        }
    }

    /// A plain-text model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![PartData::Text(text.into())],
        }
    }
}

/// Unified generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Model to use
    pub model: String,
    /// System-level behavioral instruction
    pub system: Option<String>,
    /// Conversation turns, oldest first
    pub turns: Vec<Turn>,
    /// JSON Schema the response must conform to (enforced output)
    pub response_schema: Option<Value>,
    /// Enable web-grounding tools
    pub grounding: bool,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    pub max_output_tokens: Option<i64>,
}

impl GenerateRequest {
    /// A single-turn request with defaults for everything else.
    pub fn prompt(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            turns: vec![Turn::user(text)],
            response_schema: None,
            grounding: false,
            temperature: None,
            max_output_tokens: None,
        }
    }
}

/// Unified generation response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Raw response text
    pub text: String,
    /// Pre-validated payload, present only when the backend enforced the
    /// requested response schema. Trusted without re-extraction.
    pub structured: Option<Value>,
}

/// Incremental text fragments from a streaming generation call.
///
/// Fragments arrive in emission order, each delivered once; the channel
/// closes when the model signals completion.
pub type FragmentStream = mpsc::Receiver<Result<String, AiError>>;

// ============================================================================
// Backend Trait
// ============================================================================

/// Remote generation capability.
///
/// Implementations handle authentication, request formatting, and response
/// parsing for a specific generative API. Transport failures are normalized
/// to [`AiError::Remote`].
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Backend name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Invoke the generation capability exactly once.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, AiError>;

    /// Invoke the generation capability in streaming mode.
    async fn generate_stream(&self, request: GenerateRequest) -> Result<FragmentStream, AiError>;
}
