//! Huduma Common - Shared types, utilities, and configuration for the Huduma marketplace.
//!
//! This crate provides:
//! - Configuration types and environment loading
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AiConfig, ChatConfig, Config, HubConfig, LoggingConfig};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{AiConfig, ChatConfig, Config, HubConfig};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
