// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-session value history and end-of-session statistics

use crate::handler::NamedValues;
use crate::telemetry::DebugRecord;
use serde::Serialize;
use tracing::{info, warn};

/// Values recorded while a debug-enabled session runs, one entry per tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionHistory {
    pub motors: Vec<NamedValues>,
    pub sensors: Vec<NamedValues>,
    pub debug: Vec<DebugRecord>,
}

impl SessionHistory {
    pub fn is_empty(&self) -> bool {
        self.motors.is_empty() && self.sensors.is_empty() && self.debug.is_empty()
    }

    pub fn clear(&mut self) {
        self.motors.clear();
        self.sensors.clear();
        self.debug.clear();
    }

    /// Every recorded value for `name`, in tick order
    pub fn samples(entries: &[NamedValues], name: &str) -> Vec<f64> {
        entries.iter().filter_map(|e| e.get(name).copied()).collect()
    }
}

/// Descriptive statistics over one value history
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueStats {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub mean: f64,
}

impl ValueStats {
    /// `None` for an empty history
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        Some(Self {
            min: sorted[0],
            max: sorted[n - 1],
            median,
            mean: sorted.iter().sum::<f64>() / n as f64,
        })
    }
}

/// History and statistics for one sensor or motor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSummary {
    pub name: String,
    pub samples: Vec<f64>,
    pub stats: Option<ValueStats>,
}

/// Report produced when a session closes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub ticks: u64,
    pub motors: Vec<ValueSummary>,
    pub sensors: Vec<ValueSummary>,
    pub last_debug: Option<DebugRecord>,
}

impl SessionSummary {
    /// Summarize `history` for the declared motor and sensor names and log the result
    pub fn build(
        session_id: i64,
        ticks: u64,
        motor_names: &[String],
        sensor_names: &[String],
        history: &SessionHistory,
    ) -> Self {
        info!("Session {} summary ({} ticks):", session_id, ticks);
        let motors = summarize("motor", motor_names, &history.motors);
        let sensors = summarize("sensor", sensor_names, &history.sensors);

        let last_debug = history.debug.last().cloned();
        if let Some(record) = &last_debug {
            info!(
                "  last debug record (tick {}): global_stability_rate={:.4} global_energy_estimate={:.4}",
                record.tick,
                record.global_stability_rate,
                record.global_energy_estimate
            );
            for (block, rate) in &record.block_stability_rates {
                info!(
                    "    block {}: stability_rate={:.4} energy_estimate={:.4} stable_time={:.1}",
                    block,
                    rate,
                    record.block_energy_estimates.get(block).copied().unwrap_or_default(),
                    record.block_stable_times.get(block).copied().unwrap_or_default()
                );
            }
        }

        Self {
            session_id,
            ticks,
            motors,
            sensors,
            last_debug,
        }
    }

    pub fn motor(&self, name: &str) -> Option<&ValueSummary> {
        self.motors.iter().find(|s| s.name == name)
    }

    pub fn sensor(&self, name: &str) -> Option<&ValueSummary> {
        self.sensors.iter().find(|s| s.name == name)
    }
}

fn summarize(kind: &str, names: &[String], entries: &[NamedValues]) -> Vec<ValueSummary> {
    names
        .iter()
        .map(|name| {
            let samples = SessionHistory::samples(entries, name);
            if samples.is_empty() {
                warn!("No {} history recorded for '{}'", kind, name);
            }
            let stats = ValueStats::from_samples(&samples);
            match &stats {
                Some(s) => info!(
                    "  {} {}: min={:.4} max={:.4} median={:.4} mean={:.4}",
                    kind, name, s.min, s.max, s.median, s.mean
                ),
                None => info!("  {} {}: no samples", kind, name),
            }
            ValueSummary {
                name: name.clone(),
                samples,
                stats,
            }
        })
        .collect()
}
