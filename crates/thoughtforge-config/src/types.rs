// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! `SessionConfig` maps a `.params` document; `ConnectionSettings` holds where and
//! how to reach the server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::{ConfigError, ConfigResult};

/// Name field of a sensor or motor declaration
///
/// A single declaration may register several identically configured entries by
/// listing multiple names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclaredName {
    Single(String),
    Multiple(Vec<String>),
}

impl DeclaredName {
    /// Number of entries this declaration registers on the server
    pub fn len(&self) -> usize {
        match self {
            DeclaredName::Single(_) => 1,
            DeclaredName::Multiple(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every declared name
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let names: &[String] = match self {
            DeclaredName::Single(name) => std::slice::from_ref(name),
            DeclaredName::Multiple(names) => names.as_slice(),
        };
        names.iter().map(String::as_str)
    }
}

/// One sensor or motor declaration
///
/// Everything besides `name` is opaque metadata forwarded to the server unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: DeclaredName,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Declaration {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: DeclaredName::Single(name.into()),
            metadata: Map::new(),
        }
    }

    pub fn multiple<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: DeclaredName::Multiple(names.into_iter().map(Into::into).collect()),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Tunable session parameters sent with `/initSession`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTunables {
    pub internal_timescale: i64,
    pub ticks_per_sensor_sample: i64,
    pub center_block_size_extra: i64,
    pub center_block_stride: i64,
    pub random_seed: i64,
}

impl Default for SessionTunables {
    fn default() -> Self {
        Self {
            internal_timescale: 1,
            ticks_per_sensor_sample: 1,
            center_block_size_extra: 0,
            center_block_stride: 1,
            random_seed: 42,
        }
    }
}

/// Session configuration document (`.params`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Protocol version; checked against `CURRENT_CLIENT_PARAMS_VERSION` at session start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub sensors: Vec<Declaration>,
    pub motors: Vec<Declaration>,
    #[serde(default)]
    pub enable_debug: bool,
    #[serde(flatten)]
    pub tunables: SessionTunables,
}

impl SessionConfig {
    /// Build a config programmatically, with default tunables
    pub fn new(version: i64, sensors: Vec<Declaration>, motors: Vec<Declaration>) -> Self {
        Self {
            version: Some(version),
            sensors,
            motors,
            enable_debug: false,
            tunables: SessionTunables::default(),
        }
    }

    pub fn with_debug(mut self, enable_debug: bool) -> Self {
        self.enable_debug = enable_debug;
        self
    }

    pub fn with_tunables(mut self, tunables: SessionTunables) -> Self {
        self.tunables = tunables;
        self
    }

    /// Interpret a generic key-value document as a session configuration
    ///
    /// # Errors
    ///
    /// `MissingRequired` if `sensors` or `motors` is absent, `InvalidValue` if any
    /// field has the wrong shape.
    pub fn from_document(document: &Map<String, Value>) -> ConfigResult<Self> {
        for key in ["sensors", "motors"] {
            if !document.contains_key(key) {
                return Err(ConfigError::MissingRequired(key.to_string()));
            }
        }
        serde_json::from_value(Value::Object(document.clone()))
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Number of sensors the server should register (list-valued names count per element)
    pub fn declared_sensor_count(&self) -> usize {
        self.sensors.iter().map(|d| d.name.len()).sum()
    }

    /// Number of motors the server should register (list-valued names count per element)
    pub fn declared_motor_count(&self) -> usize {
        self.motors.iter().map(|d| d.name.len()).sum()
    }

    /// All declared sensor names, in declaration order
    pub fn sensor_names(&self) -> Vec<String> {
        expand_names(&self.sensors)
    }

    /// All declared motor names, in declaration order
    pub fn motor_names(&self) -> Vec<String> {
        expand_names(&self.motors)
    }
}

fn expand_names(declarations: &[Declaration]) -> Vec<String> {
    declarations
        .iter()
        .flat_map(|d| d.name.iter().map(str::to_string))
        .collect()
}

/// A previously saved model: the configuration it was trained with plus its data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModelFile {
    pub specification: SessionConfig,
    /// `{ "weights": [...nested lists...], "values": [...] }`
    pub model_data: Value,
}

/// Where and how to reach the ThoughtForge server
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    /// Sent as `X-thoughtforge-key` on every request
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4343,
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Defaults overridden by `.env` and the process environment
    pub fn from_env() -> Self {
        crate::loader::load_dotenv();
        let mut settings = Self::default();
        crate::loader::apply_environment_overrides(&mut settings);
        settings
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `host:port` authority used to build request URLs
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
