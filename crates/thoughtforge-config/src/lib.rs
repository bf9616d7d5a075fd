// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ThoughtForge Configuration
//!
//! Loads the session configuration documents that describe a client's sensors,
//! motors and tunable session parameters, plus the connection settings used to
//! reach a ThoughtForge server.
//!
//! - `.params` JSON documents (the only accepted session configuration files)
//! - saved model files (inline specification + model data)
//! - environment variable overrides (`HOST`, `PORT`, `THOUGHTFORGE_API_KEY`, `.env`)
//! - CLI argument overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use thoughtforge_config::{load_session_config, ConnectionSettings};
//!
//! let config = load_session_config("configs/cartpole.params").expect("Failed to load config");
//! let settings = ConnectionSettings::from_env();
//!
//! println!("{} sensors -> {}:{}", config.declared_sensor_count(), settings.host, settings.port);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The only session configuration version understood by this client
pub const CURRENT_CLIENT_PARAMS_VERSION: i64 = 0;

/// File extension required for session configuration documents
pub const CLIENT_PARAMS_EXTENSION: &str = "params";

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{
    apply_cli_overrides, apply_environment_overrides, load_client_params, load_dotenv,
    load_saved_model, load_session_config,
};
pub use types::*;
pub use validation::{validate_session_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config files must be of type .{expected}, got {path}")]
    FormatError { expected: String, path: String },

    #[error("Failed to read config file")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in config document: {0}")]
    Parse(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
