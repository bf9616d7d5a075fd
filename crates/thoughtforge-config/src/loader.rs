// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Session documents come from `.params` files (or the `specification` of a saved
//! model). Connection settings follow a 3-tier scheme:
//! 1. Built-in defaults (`0.0.0.0:4343`, no API key)
//! 2. Environment variables, after loading `.env`
//! 3. CLI arguments (explicit user overrides)

use crate::{
    ConfigError, ConfigResult, ConnectionSettings, SavedModelFile, SessionConfig,
    CLIENT_PARAMS_EXTENSION,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variables read by `apply_environment_overrides`
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_THOUGHTFORGE_HOST: &str = "THOUGHTFORGE_HOST";
pub const ENV_THOUGHTFORGE_PORT: &str = "THOUGHTFORGE_PORT";
pub const ENV_API_KEY: &str = "THOUGHTFORGE_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "THOUGHTFORGE_TIMEOUT_SECS";

/// Load a session configuration document
///
/// The file must carry the `.params` extension. The content is parsed as a generic
/// JSON object and returned unmodified; required keys are checked later by
/// `SessionConfig::from_document`.
///
/// # Errors
///
/// `FormatError` for any other extension, `Io` if the file cannot be read, `Parse`
/// if it is not a JSON object.
pub fn load_client_params(path: impl AsRef<Path>) -> ConfigResult<Map<String, Value>> {
    let path = path.as_ref();
    debug!("Loading client params from {}", path.display());

    let extension = path.extension().and_then(|e| e.to_str());
    if extension != Some(CLIENT_PARAMS_EXTENSION) {
        return Err(ConfigError::FormatError {
            expected: CLIENT_PARAMS_EXTENSION.to_string(),
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Object(document) => Ok(document),
        other => Err(ConfigError::Parse(format!(
            "expected a JSON object at the top level of {}, found {}",
            path.display(),
            json_kind(&other)
        ))),
    }
}

/// Load and interpret a `.params` file as a `SessionConfig`
pub fn load_session_config(path: impl AsRef<Path>) -> ConfigResult<SessionConfig> {
    let document = load_client_params(path)?;
    SessionConfig::from_document(&document)
}

/// Load a saved model file (`{"specification": {...}, "model_data": {...}}`)
///
/// Saved models are plain JSON and are not subject to the `.params` extension rule.
pub fn load_saved_model(path: impl AsRef<Path>) -> ConfigResult<SavedModelFile> {
    let path = path.as_ref();
    debug!("Loading saved model from {}", path.display());

    let content = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)?;
    let Some(object) = document.as_object() else {
        return Err(ConfigError::Parse(format!(
            "expected a JSON object in {}",
            path.display()
        )));
    };
    let specification = object
        .get("specification")
        .and_then(Value::as_object)
        .ok_or_else(|| ConfigError::MissingRequired("specification".to_string()))?;
    let model_data = object
        .get("model_data")
        .cloned()
        .ok_or_else(|| ConfigError::MissingRequired("model_data".to_string()))?;

    Ok(SavedModelFile {
        specification: SessionConfig::from_document(specification)?,
        model_data,
    })
}

/// Load `.env` from the working directory (or a parent), if present
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Failed to load .env file: {}", e),
    }
}

/// Apply environment variable overrides to connection settings
///
/// Supported environment variables:
/// - `HOST` / `THOUGHTFORGE_HOST` -> `host` (the prefixed name wins)
/// - `PORT` / `THOUGHTFORGE_PORT` -> `port` (the prefixed name wins)
/// - `THOUGHTFORGE_API_KEY` -> `api_key`
/// - `THOUGHTFORGE_TIMEOUT_SECS` -> `request_timeout`
pub fn apply_environment_overrides(settings: &mut ConnectionSettings) {
    for name in [ENV_HOST, ENV_THOUGHTFORGE_HOST] {
        if let Ok(value) = env::var(name) {
            if !value.is_empty() {
                settings.host = value;
            }
        }
    }
    for name in [ENV_PORT, ENV_THOUGHTFORGE_PORT] {
        if let Ok(value) = env::var(name) {
            match value.parse::<u16>() {
                Ok(port) => settings.port = port,
                Err(_) => warn!("Ignoring {}={}: not a valid port", name, value),
            }
        }
    }
    if let Ok(value) = env::var(ENV_API_KEY) {
        if !value.is_empty() {
            settings.api_key = Some(value);
        }
    }
    if let Ok(value) = env::var(ENV_TIMEOUT_SECS) {
        match value.parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs > 0.0 => {
                settings.request_timeout = Duration::from_secs_f64(secs)
            }
            _ => warn!("Ignoring {}={}: not a positive number", ENV_TIMEOUT_SECS, value),
        }
    }
}

/// Apply CLI argument overrides to connection settings
///
/// # Arguments
///
/// * `settings` - Settings to modify
/// * `cli_args` - e.g. `{"host": "192.168.1.1", "port": "4343", "api_key": "..."}`
pub fn apply_cli_overrides(settings: &mut ConnectionSettings, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("host") {
        settings.host = value.clone();
    }
    if let Some(value) = cli_args.get("port") {
        if let Ok(port) = value.parse::<u16>() {
            settings.port = port;
        }
    }
    if let Some(value) = cli_args.get("api_key") {
        settings.api_key = Some(value.clone());
    }
    if let Some(value) = cli_args.get("timeout_secs") {
        if let Ok(secs) = value.parse::<f64>() {
            if secs.is_finite() && secs > 0.0 {
                settings.request_timeout = Duration::from_secs_f64(secs);
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 6] = [
        ENV_HOST,
        ENV_PORT,
        ENV_THOUGHTFORGE_HOST,
        ENV_THOUGHTFORGE_PORT,
        ENV_API_KEY,
        ENV_TIMEOUT_SECS,
    ];

    fn clear_override_vars() {
        for name in OVERRIDE_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_rejects_wrong_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cartpole.json");
        File::create(&path).unwrap();

        let err = load_client_params(&path).unwrap_err();
        assert!(matches!(err, ConfigError::FormatError { .. }));
        assert!(err.to_string().contains(".params"));
    }

    #[test]
    fn test_loads_document_unmodified() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cartpole.params");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"version": 0, "sensors": [{{"name": "pos"}}], "motors": [], "custom": "kept"}}"#
        )
        .unwrap();

        let document = load_client_params(&path).unwrap();
        assert_eq!(document.get("custom"), Some(&Value::from("kept")));
        assert_eq!(document.get("version"), Some(&Value::from(0)));
    }

    #[test]
    fn test_non_object_document_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.params");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let err = load_client_params(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("an array")));
    }

    #[test]
    fn test_load_saved_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reacher_model.json");
        std::fs::write(
            &path,
            r#"{
                "specification": {"version": 0, "sensors": [{"name": "s"}], "motors": [{"name": "m"}]},
                "model_data": {"weights": [[[1.0, 2.0]]], "values": [0.5]}
            }"#,
        )
        .unwrap();

        let saved = load_saved_model(&path).unwrap();
        assert_eq!(saved.specification.sensor_names(), vec!["s"]);
        assert!(saved.model_data.get("weights").is_some());
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let mut settings = ConnectionSettings::default();

        env::set_var(ENV_HOST, "10.1.1.1");
        env::set_var(ENV_THOUGHTFORGE_HOST, "tf.local");
        env::set_var(ENV_PORT, "9999");
        env::set_var(ENV_API_KEY, "secret");

        apply_environment_overrides(&mut settings);
        clear_override_vars();

        assert_eq!(settings.host, "tf.local");
        assert_eq!(settings.port, 9999);
        assert_eq!(settings.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let mut settings = ConnectionSettings::default();

        env::set_var(ENV_PORT, "not-a-port");
        apply_environment_overrides(&mut settings);
        clear_override_vars();

        assert_eq!(settings.port, 4343);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let mut settings = ConnectionSettings::default();

        env::set_var(ENV_HOST, "env-host");
        env::set_var(ENV_PORT, "9000");
        apply_environment_overrides(&mut settings);
        clear_override_vars();

        let mut cli_args = HashMap::new();
        cli_args.insert("host".to_string(), "cli-host".to_string());
        apply_cli_overrides(&mut settings, &cli_args);

        // CLI wins for host, env wins for port (no CLI override)
        assert_eq!(settings.host, "cli-host");
        assert_eq!(settings.port, 9000);
    }
}
