//! Configuration validation
//!
//! Structural checks on a `SessionConfig` that the server would otherwise reject
//! with a registration mismatch: empty or duplicated names and tunables outside
//! their valid ranges.

use crate::{ConfigError, ConfigResult, SessionConfig};
use std::collections::HashSet;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    EmptyName { section: String, index: usize },
    DuplicateName { section: String, name: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName { section, index } => {
                write!(f, "{}[{}] declares an empty name", section, index)
            }
            Self::DuplicateName { section, name } => {
                write!(f, "{} name '{}' is declared more than once", section, name)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate a session configuration
///
/// Checks for:
/// - Empty names (including an empty name list)
/// - Names declared twice within sensors or within motors
/// - Tunables below their minimum
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_session_config(config: &SessionConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_names("sensors", config, &mut errors);
    validate_names("motors", config, &mut errors);
    validate_tunables(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Session configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_names(section: &str, config: &SessionConfig, errors: &mut Vec<ConfigValidationError>) {
    let declarations = if section == "sensors" {
        &config.sensors
    } else {
        &config.motors
    };

    let mut seen = HashSet::new();
    for (index, declaration) in declarations.iter().enumerate() {
        if declaration.name.is_empty() || declaration.name.iter().any(|n| n.trim().is_empty()) {
            errors.push(ConfigValidationError::EmptyName {
                section: section.to_string(),
                index,
            });
        }
        for name in declaration.name.iter() {
            if !name.is_empty() && !seen.insert(name) {
                errors.push(ConfigValidationError::DuplicateName {
                    section: section.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }
}

fn validate_tunables(config: &SessionConfig, errors: &mut Vec<ConfigValidationError>) {
    let tunables = &config.tunables;
    let minimums = [
        ("internal_timescale", tunables.internal_timescale, 1),
        ("ticks_per_sensor_sample", tunables.ticks_per_sensor_sample, 1),
        ("center_block_stride", tunables.center_block_stride, 1),
        ("center_block_size_extra", tunables.center_block_size_extra, 0),
    ];
    for (field, value, minimum) in minimums {
        if value < minimum {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: format!("must be at least {}, got {}", minimum, value),
            });
        }
    }
}
