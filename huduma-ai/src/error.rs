//! Error types for the AI orchestration core.

use thiserror::Error;

/// Result type alias using the AI error type.
pub type Result<T> = std::result::Result<T, AiError>;

/// Truncate model output for error messages.
///
/// Raw model responses can run to kilobytes; errors carry the full text in
/// their fields for diagnosis but display only a short preview.
fn preview(text: &str) -> String {
    const MAX: usize = 120;
    let trimmed = text.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut cut = MAX;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}

/// Failure to recover a JSON value from raw model text.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The candidate substring (or the whole text) did not parse as JSON.
    /// Carries both the original text and the extracted substring for
    /// diagnosis.
    #[error("model output did not parse as JSON: {}", preview(original))]
    MalformedOutput {
        original: String,
        extracted: Option<String>,
    },

    /// An opening delimiter was found but never closed before input end.
    #[error("no matching closing delimiter in model output: {}", preview(original))]
    UnbalancedStructure { original: String },
}

/// Unified error type for AI-backed operations.
#[derive(Error, Debug)]
pub enum AiError {
    /// JSON recovery from raw model text failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The remote generation call itself failed (network, quota, invalid
    /// request).
    #[error("remote generation failed: {message}")]
    Remote {
        message: String,
        status_code: Option<u16>,
    },

    /// A successfully parsed value did not match the expected shape.
    #[error("JSON shape error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sub-task-scoped error annotation.
    #[error("[{task}] {source}")]
    Task {
        task: String,
        #[source]
        source: Box<AiError>,
    },

    /// Operation referenced a session identifier not present in the live
    /// table.
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl AiError {
    /// Create a remote-capability error without a status code.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            status_code: None,
        }
    }

    /// Annotate this error with the sub-task it belongs to.
    pub fn for_task(self, task: impl Into<String>) -> Self {
        Self::Task {
            task: task.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is a session lookup failure.
    pub const fn is_session_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_))
    }
}
