//! # Configuration Modules
//!
//! Resolution of client settings from explicit values, the process
//! environment and built-in defaults, in that order of precedence.

/// `ClientConfig` and its builder.
pub mod config_client;

pub use config_client::{ClientConfig, ClientConfigBuilder, ConfigError};
