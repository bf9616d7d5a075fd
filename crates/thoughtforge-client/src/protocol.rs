//! Wire payloads for the three session endpoints
//!
//! Several response fields are JSON documents serialized into strings
//! (`"motor_ids": "{\"force\": 0}"`). [`decode_embedded`] accepts either that form or
//! the plain JSON value.

use crate::error::{ClientError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Decode a field that may hold JSON directly or JSON serialized into a string
///
/// Absent and `null` fields decode to `None`.
pub fn decode_embedded<T: DeserializeOwned>(body: &Map<String, Value>, field: &str) -> Result<Option<T>> {
    let decoded = match body.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => serde_json::from_str(text),
        Some(other) => serde_json::from_value(other.clone()),
    };
    decoded
        .map(Some)
        .map_err(|e| ClientError::Decode(format!("field '{}': {}", field, e)))
}

fn body_object<'a>(body: Option<&'a Value>, endpoint: &str) -> Result<&'a Map<String, Value>> {
    body.and_then(Value::as_object)
        .ok_or_else(|| ClientError::Decode(format!("{} returned no JSON object", endpoint)))
}

/// Reply to `/initSession`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitSessionReply {
    pub session_id: i64,
    pub sensor_ids: BTreeMap<String, i64>,
    pub motor_ids: BTreeMap<String, i64>,
    pub block_ids: BTreeMap<String, i64>,
    pub session_log: Vec<String>,
}

impl InitSessionReply {
    pub fn from_body(body: Option<&Value>) -> Result<Self> {
        let body = body_object(body, "initSession")?;
        let session_id = body
            .get("session_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ClientError::Decode("initSession reply has no integer session_id".to_string()))?;

        // A rejected session carries no id maps
        if session_id < 0 {
            return Ok(Self {
                session_id,
                session_log: decode_embedded(body, "session_log")?.unwrap_or_default(),
                ..Self::default()
            });
        }

        Ok(Self {
            session_id,
            sensor_ids: decode_embedded(body, "sensor_ids")?.unwrap_or_default(),
            motor_ids: decode_embedded(body, "motor_ids")?.unwrap_or_default(),
            block_ids: decode_embedded(body, "block_ids")?.unwrap_or_default(),
            session_log: decode_embedded(body, "session_log")?.unwrap_or_default(),
        })
    }
}

/// Reply to `/updateSim`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSimReply {
    /// Motor id (as sent, a string) to value
    pub motor_dict: HashMap<String, f64>,
    pub session_log: Vec<String>,
    pub debugging_data: Option<Value>,
}

impl UpdateSimReply {
    pub fn from_body(body: Option<&Value>) -> Result<Self> {
        let body = body_object(body, "updateSim")?;
        Ok(Self {
            motor_dict: decode_embedded(body, "motor_dict")?.unwrap_or_default(),
            session_log: decode_embedded(body, "session_log")?.unwrap_or_default(),
            debugging_data: decode_embedded(body, "debugging_data")?,
        })
    }
}

/// Reply to `/shutdownSession`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShutdownSessionReply {
    pub session_log: Vec<String>,
}

impl ShutdownSessionReply {
    pub fn from_body(body: Option<&Value>) -> Result<Self> {
        match body.and_then(Value::as_object) {
            Some(body) => Ok(Self {
                session_log: decode_embedded(body, "session_log")?.unwrap_or_default(),
            }),
            None => Ok(Self::default()),
        }
    }
}
