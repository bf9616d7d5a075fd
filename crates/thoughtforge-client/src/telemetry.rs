// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Debug telemetry relay
//!
//! The server reports per-block statistics keyed by numeric block id. The relay
//! re-keys them by the block names returned at initialization so handlers never
//! see server-internal ids.

use crate::error::{ClientError, LookupError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Raw `debugging_data` payload of an `/updateSim` reply
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DebugPayload {
    pub global_stability_rate: f64,
    pub global_energy_estimate: f64,
    pub block_stability_rates: HashMap<String, f64>,
    pub block_energy_estimates: HashMap<String, f64>,
    pub block_stable_times: HashMap<String, f64>,
}

impl DebugPayload {
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| ClientError::Decode(format!("debugging_data: {}", e)))
    }
}

/// Debug payload with block ids replaced by block names
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugRecord {
    /// Tick the record was received on
    pub tick: u64,
    pub global_stability_rate: f64,
    pub global_energy_estimate: f64,
    pub block_stability_rates: BTreeMap<String, f64>,
    pub block_energy_estimates: BTreeMap<String, f64>,
    pub block_stable_times: BTreeMap<String, f64>,
}

/// Build a named debug record from a raw payload
///
/// `block_ids` maps block name to server id, as returned by `/initSession`.
///
/// # Errors
///
/// `LookupError::Block` for any payload key that is not the id of a named block.
pub fn relay_debug_payload(
    payload: &DebugPayload,
    block_ids: &BTreeMap<String, i64>,
    tick: u64,
) -> Result<DebugRecord> {
    let names_by_id: HashMap<i64, &str> = block_ids
        .iter()
        .map(|(name, id)| (*id, name.as_str()))
        .collect();

    Ok(DebugRecord {
        tick,
        global_stability_rate: payload.global_stability_rate,
        global_energy_estimate: payload.global_energy_estimate,
        block_stability_rates: rekey_by_name(&payload.block_stability_rates, &names_by_id)?,
        block_energy_estimates: rekey_by_name(&payload.block_energy_estimates, &names_by_id)?,
        block_stable_times: rekey_by_name(&payload.block_stable_times, &names_by_id)?,
    })
}

fn rekey_by_name(
    by_id: &HashMap<String, f64>,
    names_by_id: &HashMap<i64, &str>,
) -> std::result::Result<BTreeMap<String, f64>, LookupError> {
    by_id
        .iter()
        .map(|(key, value)| {
            let name = key
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|id| names_by_id.get(&id))
                .ok_or_else(|| LookupError::Block(key.clone()))?;
            Ok((name.to_string(), *value))
        })
        .collect()
}
