// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Embedding interface between a session and the application that owns the
//! simulated environment

use crate::error::{LookupError, Result};
use crate::session::StopHandle;
use crate::telemetry::DebugRecord;
use std::collections::BTreeMap;

/// Values keyed by declared sensor or motor name
pub type NamedValues = BTreeMap<String, f64>;

/// What a handler learns about the session when the simulation starts
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: i64,
    pub sensor_names: Vec<String>,
    pub motor_names: Vec<String>,
    pub debug_enabled: bool,
    /// Clone of the session's stop flag, for handlers that end the run themselves
    pub stop: StopHandle,
}

/// Application side of the control loop
///
/// Only `update` is required. It is called once per tick with the motor command
/// produced by the previous tick (all zeros on the first tick) and must return the
/// sensor readings to send to the server.
pub trait SessionHandler {
    /// Apply `motor_command` to the environment and return new sensor readings
    fn update(&mut self, motor_command: &NamedValues) -> Result<NamedValues>;

    /// Called once after initialization, before the first tick
    fn sim_started(&mut self, _info: &SessionInfo) -> Result<()> {
        Ok(())
    }

    /// Called once when the update loop exits, whether or not it failed
    fn sim_ended(&mut self) {}

    /// Called with every debug record when the session collects debug data
    fn debug_data_received(&mut self, _record: &DebugRecord) {}
}

impl<H: SessionHandler + ?Sized> SessionHandler for &mut H {
    fn update(&mut self, motor_command: &NamedValues) -> Result<NamedValues> {
        (**self).update(motor_command)
    }

    fn sim_started(&mut self, info: &SessionInfo) -> Result<()> {
        (**self).sim_started(info)
    }

    fn sim_ended(&mut self) {
        (**self).sim_ended()
    }

    fn debug_data_received(&mut self, record: &DebugRecord) {
        (**self).debug_data_received(record)
    }
}

/// Handler backed by a closure, for embedders that only need `update`
pub struct FnHandler<F> {
    update: F,
}

/// Wrap a closure as a [`SessionHandler`]
pub fn handler_fn<F>(update: F) -> FnHandler<F>
where
    F: FnMut(&NamedValues) -> Result<NamedValues>,
{
    FnHandler { update }
}

impl<F> SessionHandler for FnHandler<F>
where
    F: FnMut(&NamedValues) -> Result<NamedValues>,
{
    fn update(&mut self, motor_command: &NamedValues) -> Result<NamedValues> {
        (self.update)(motor_command)
    }
}

/// Read one motor from a command
///
/// # Errors
///
/// `LookupError::Motor` if the command has no entry for `name`.
pub fn motor_value(motor_command: &NamedValues, name: &str) -> std::result::Result<f64, LookupError> {
    motor_command
        .get(name)
        .copied()
        .ok_or_else(|| LookupError::Motor(name.to_string()))
}
