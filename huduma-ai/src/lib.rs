//! Huduma AI - the AI orchestration core for the Huduma marketplace.
//!
//! This crate turns free-text and image input into structured,
//! schema-conformant data the rest of the application can trust, despite
//! the generative backend returning unstructured, sometimes malformed
//! text:
//! - Structured-text extraction recovering JSON from noisy model output
//! - A stateless call wrapper normalizing one backend invocation per
//!   named sub-task
//! - A settle-all-with-fallback combinator fanning independent sub-tasks
//!   out concurrently with per-task degradation (the "local hub" view)
//! - A chat session manager for streaming conversational state
//!
//! ## Architecture
//!
//! ```text
//! caller → AiService → GenerativeBackend (Gemini) → extract_json → caller
//!            │
//!            └── settle_all: N sub-tasks fan out, fall back per task
//! ```
//!
//! The HTTP routing layer, persistence, and authentication live elsewhere;
//! this crate only owns the AI boundary.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod aggregate;
pub mod call;
pub mod chat;
pub mod error;
pub mod extract;
pub mod hub;
pub mod moderation;
pub mod profile;
pub mod provider;

pub use aggregate::{settle_all, Fallback, SubTask};
pub use call::{AiService, Attachment, TaskSpec};
pub use chat::ChatSessionManager;
pub use error::{AiError, ExtractError, Result};
pub use extract::extract_json;
pub use hub::{local_hub, LocalHubData};
pub use moderation::{verify_provider_image, ImageVerification};
pub use profile::{generate_provider_profile, ProviderProfile};
pub use provider::{
    FragmentStream, GeminiClient, GenerateRequest, GenerateResponse, GenerativeBackend, PartData,
    Role, Turn,
};
