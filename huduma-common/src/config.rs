//! Configuration for the Huduma marketplace services.
//!
//! # Configuration Priority
//!
//! 1. Explicit values set by the caller
//! 2. Environment variables
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY` → ai.api_key
//! - `HUDUMA_AI_MODEL` → ai.model
//! - `HUDUMA_AI_BASE_URL` → ai.base_url
//! - `HUDUMA_DEFAULT_LOCATION` → hub.default_location
//! - `HUDUMA_LOG_LEVEL` → logging.level

use serde::{Deserialize, Serialize};

// ============================================================================
// AI Backend Configuration
// ============================================================================

/// Configuration for the generative backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key for the generative backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier used for non-streaming calls.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the generative API. Overridable for tests.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature (0.0 - 1.0).
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum tokens to generate per call.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: i64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_output_tokens() -> i64 {
    8192
}

// ============================================================================
// Chat Session Configuration
// ============================================================================

/// Configuration for chat session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Seconds of inactivity after which `sweep_idle` reclaims a session.
    /// `None` disables the sweep entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,

    /// System-level behavioral instruction applied to every session.
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: None,
            system_instruction: default_system_instruction(),
        }
    }
}

fn default_system_instruction() -> String {
    "You are the Huduma marketplace assistant. Help customers find, book, \
     and review local service providers. Be concise and practical; never \
     invent providers, prices, or availability."
        .into()
}

// ============================================================================
// Local Hub Configuration
// ============================================================================

/// Configuration for the local hub aggregate view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Location used when the caller does not supply one.
    #[serde(default = "default_location")]
    pub default_location: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            default_location: default_location(),
        }
    }
}

fn default_location() -> String {
    "Nairobi".into()
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Unified configuration for Huduma services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables over defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay environment variables onto this configuration.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.ai.api_key = Some(key);
            }
        }
        if self.ai.api_key.is_none() {
            if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
                if !key.is_empty() {
                    self.ai.api_key = Some(key);
                }
            }
        }
        if let Ok(model) = std::env::var("HUDUMA_AI_MODEL") {
            self.ai.model = model;
        }
        if let Ok(url) = std::env::var("HUDUMA_AI_BASE_URL") {
            self.ai.base_url = url;
        }
        if let Ok(location) = std::env::var("HUDUMA_DEFAULT_LOCATION") {
            self.hub.default_location = location;
        }
        if let Ok(level) = std::env::var("HUDUMA_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}
