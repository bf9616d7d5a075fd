// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Session lifecycle and update loop
//!
//! A [`Session`] owns one remote simulation session:
//!
//! ```text
//! Uninitialized -> Initializing -> Active -> Closed
//!                       |
//!                       +-> Failed
//! ```
//!
//! Requests are strictly sequential. Each tick the handler is called, then exactly
//! one `/updateSim` request is sent and its reply awaited before the next tick.

use crate::error::{ClientError, EntryKind, LookupError, Result};
use crate::handler::{NamedValues, SessionHandler, SessionInfo};
use crate::protocol::{InitSessionReply, ShutdownSessionReply, UpdateSimReply};
use crate::snapshot::ModelSnapshot;
use crate::summary::{SessionHistory, SessionSummary};
use crate::telemetry::{relay_debug_payload, DebugPayload};
use crate::transport::{
    HttpReply, SessionTransport, INIT_SESSION_PATH, SHUTDOWN_SESSION_PATH, UPDATE_SIM_PATH,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thoughtforge_config::{validate_session_config, SessionConfig, CURRENT_CLIENT_PARAMS_VERSION};
use tracing::{debug, info, trace, warn};

/// Session id meaning "no session"
const NO_SESSION: i64 = -1;

/// Lifecycle phase of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Active,
    Closed,
    Failed,
}

/// Cooperative stop flag, honoured at the next tick boundary
///
/// Clones share the same flag, so a handle can be moved into a signal handler or
/// another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Runtime options that are not part of the session configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Stop the update loop after this many ticks
    pub max_ticks: Option<u64>,
}

impl SessionOptions {
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }
}

/// One remote simulation session
///
/// Dropping a session that is still active shuts it down on the server.
pub struct Session<T: SessionTransport> {
    config: SessionConfig,
    transport: T,
    options: SessionOptions,
    state: SessionState,
    session_id: i64,
    sensor_ids: BTreeMap<String, i64>,
    motor_ids: BTreeMap<String, i64>,
    block_ids: BTreeMap<String, i64>,
    ticks: u64,
    session_logs: Vec<String>,
    history: SessionHistory,
    stop: StopHandle,
}

impl<T: SessionTransport> Session<T> {
    pub fn new(config: SessionConfig, transport: T) -> Self {
        Self::with_options(config, transport, SessionOptions::default())
    }

    pub fn with_options(config: SessionConfig, transport: T, options: SessionOptions) -> Self {
        Self {
            config,
            transport,
            options,
            state: SessionState::Uninitialized,
            session_id: NO_SESSION,
            sensor_ids: BTreeMap::new(),
            motor_ids: BTreeMap::new(),
            block_ids: BTreeMap::new(),
            ticks: 0,
            session_logs: Vec::new(),
            history: SessionHistory::default(),
            stop: StopHandle::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Server-assigned id; negative when there is no active session
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active && self.session_id >= 0
    }

    /// Number of sensors the server registered
    pub fn num_sensors(&self) -> usize {
        self.sensor_ids.len()
    }

    /// Number of motors the server registered
    pub fn num_motors(&self) -> usize {
        self.motor_ids.len()
    }

    pub fn sensor_ids(&self) -> &BTreeMap<String, i64> {
        &self.sensor_ids
    }

    pub fn motor_ids(&self) -> &BTreeMap<String, i64> {
        &self.motor_ids
    }

    pub fn block_ids(&self) -> &BTreeMap<String, i64> {
        &self.block_ids
    }

    /// Ticks completed by the update loop of the current session
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Every server log message received over this value's lifetime
    pub fn session_logs(&self) -> &[String] {
        &self.session_logs
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask the update loop to exit at the next tick boundary
    ///
    /// A stop requested before `run` is honored at the first tick. `close`
    /// clears the flag.
    pub fn stop_sim(&self) {
        self.stop.request_stop();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Register the configured sensors and motors with the server
    ///
    /// An already-active session is closed first. On success the session is
    /// `Active` and its id is returned.
    ///
    /// # Errors
    ///
    /// - `VersionMismatch` / `MissingCredential` / `Config` before any request is sent
    /// - `Transport` or `InitializationFailed` if the request fails
    /// - `InitializationRejected` for a negative session id
    /// - `RegistrationMismatch` if the id maps do not match the declarations; the
    ///   server-side session is shut down first
    ///
    /// Every error leaves the session `Failed` with a negative id.
    pub fn initialize(&mut self, snapshot: Option<&ModelSnapshot>) -> Result<i64> {
        if self.is_active() {
            debug!("[SESSION] Closing session {} before re-initializing", self.session_id);
            self.close();
        }

        match self.register(snapshot) {
            Ok(session_id) => Ok(session_id),
            Err(e) => {
                self.reset_session_scope();
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    fn register(&mut self, snapshot: Option<&ModelSnapshot>) -> Result<i64> {
        if self.config.version != Some(CURRENT_CLIENT_PARAMS_VERSION) {
            return Err(ClientError::VersionMismatch {
                found: self.config.version,
                expected: CURRENT_CLIENT_PARAMS_VERSION,
            });
        }
        if self.transport.api_key().map_or(true, |k| k.trim().is_empty()) {
            return Err(ClientError::MissingCredential);
        }
        validate_session_config(&self.config)?;

        self.state = SessionState::Initializing;

        let params = self.init_params()?;
        let body = snapshot.map(ModelSnapshot::to_wire);
        let reply = self.transport.post(INIT_SESSION_PATH, &params, body.as_ref())?;
        if !reply.is_ok() {
            return Err(ClientError::InitializationFailed {
                status: reply.status,
            });
        }

        let reply = InitSessionReply::from_body(reply.body.as_ref())?;
        self.relay_session_logs(reply.session_log);
        if reply.session_id < 0 {
            warn!("[SESSION] Session initialization failed (session_id={})", reply.session_id);
            return Err(ClientError::InitializationRejected {
                session_id: reply.session_id,
            });
        }

        let registered = check_registered(
            EntryKind::Sensor,
            self.config.declared_sensor_count(),
            reply.sensor_ids.len(),
        )
        .and_then(|()| {
            check_registered(
                EntryKind::Motor,
                self.config.declared_motor_count(),
                reply.motor_ids.len(),
            )
        });
        if let Err(e) = registered {
            self.shutdown_remote(reply.session_id);
            return Err(e);
        }

        self.session_id = reply.session_id;
        self.sensor_ids = reply.sensor_ids;
        self.motor_ids = reply.motor_ids;
        self.block_ids = reply.block_ids;
        self.ticks = 0;
        self.history.clear();
        self.state = SessionState::Active;

        info!("Session {} has been initialized.", self.session_id);
        debug!(
            "[SESSION] {} sensors, {} motors, {} blocks registered",
            self.sensor_ids.len(),
            self.motor_ids.len(),
            self.block_ids.len()
        );
        Ok(self.session_id)
    }

    fn init_params(&self) -> Result<Vec<(&'static str, String)>> {
        let version = self.config.version.unwrap_or(CURRENT_CLIENT_PARAMS_VERSION);
        let tunables = &self.config.tunables;
        Ok(vec![
            ("version", version.to_string()),
            ("internal_timescale", tunables.internal_timescale.to_string()),
            ("ticks_per_sensor_sample", tunables.ticks_per_sensor_sample.to_string()),
            ("center_block_size_extra", tunables.center_block_size_extra.to_string()),
            ("center_block_stride", tunables.center_block_stride.to_string()),
            ("random_seed", tunables.random_seed.to_string()),
            ("debug_enabled", self.config.enable_debug.to_string()),
            ("motors", serde_json::to_string(&self.config.motors)?),
            ("sensors", serde_json::to_string(&self.config.sensors)?),
        ])
    }

    /// Drive the update loop until a stop is requested or `max_ticks` is reached
    ///
    /// `handler.sim_ended()` is called on every exit, including errors.
    ///
    /// # Errors
    ///
    /// `SessionNotActive` if initialization did not succeed. Handler errors and
    /// lookup errors end the loop; failed update requests do not.
    pub fn run<H: SessionHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        if !self.is_active() {
            return Err(ClientError::SessionNotActive);
        }

        let info = SessionInfo {
            session_id: self.session_id,
            sensor_names: self.config.sensor_names(),
            motor_names: self.config.motor_names(),
            debug_enabled: self.config.enable_debug,
            stop: self.stop.clone(),
        };
        handler.sim_started(&info)?;

        info!("Session {} starting simulation....", self.session_id);
        let result = self.tick_loop(handler);
        handler.sim_ended();
        debug!("[SESSION] Update loop exited after {} ticks", self.ticks);
        result
    }

    fn tick_loop<H: SessionHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()> {
        let mut motor_command = self.zero_motor_command();

        loop {
            if self.stop.is_requested() {
                info!("[SESSION] Stop requested, ending simulation");
                return Ok(());
            }
            if self.options.max_ticks.is_some_and(|max| self.ticks >= max) {
                info!("[SESSION] Reached {} ticks, ending simulation", self.ticks);
                return Ok(());
            }

            motor_command = self.tick(handler, &motor_command)?;
        }
    }

    /// One handler call plus one `/updateSim` round trip; returns the next motor command
    fn tick<H: SessionHandler + ?Sized>(
        &mut self,
        handler: &mut H,
        motor_command: &NamedValues,
    ) -> Result<NamedValues> {
        let debug_enabled = self.config.enable_debug;
        if debug_enabled {
            self.history.motors.push(motor_command.clone());
        }

        let sensor_values = handler.update(motor_command)?;
        if debug_enabled {
            self.history.sensors.push(sensor_values.clone());
        }

        let sensor_dict = self.sensor_dict(&sensor_values)?;
        let motor_ids_requested: Vec<i64> = self.motor_ids.values().copied().collect();
        let params = [
            ("session_id", self.session_id.to_string()),
            ("sensor_dict", serde_json::to_string(&sensor_dict)?),
            ("motor_ids_requested", serde_json::to_string(&motor_ids_requested)?),
            ("collect_debug_data", debug_enabled.to_string()),
        ];
        trace!("[SESSION] tick {} sensors {:?}", self.ticks, sensor_values);

        let next_command = match self.transport.post(UPDATE_SIM_PATH, &params, None) {
            Ok(reply) if reply.is_ok() => self.apply_update_reply(handler, reply)?,
            Ok(reply) => {
                warn!(
                    "Session update failed. Server returned HTTP {}; using zero motor output",
                    reply.status
                );
                self.zero_motor_command()
            }
            Err(e) => {
                warn!("Session update failed: {}; using zero motor output", e);
                self.zero_motor_command()
            }
        };

        self.ticks += 1;
        Ok(next_command)
    }

    fn apply_update_reply<H: SessionHandler + ?Sized>(
        &mut self,
        handler: &mut H,
        reply: HttpReply,
    ) -> Result<NamedValues> {
        let reply = match UpdateSimReply::from_body(reply.body.as_ref()) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Session update reply unreadable: {}; using zero motor output", e);
                return Ok(self.zero_motor_command());
            }
        };

        let motor_values: BTreeMap<i64, f64> = reply
            .motor_dict
            .iter()
            .filter_map(|(id, value)| id.trim().parse::<i64>().ok().map(|id| (id, *value)))
            .collect();
        let next_command = self
            .motor_ids
            .iter()
            .map(|(name, id)| (name.clone(), motor_values.get(id).copied().unwrap_or(0.0)))
            .collect();

        self.relay_session_logs(reply.session_log);

        if self.config.enable_debug {
            if let Some(data) = reply.debugging_data {
                let payload = DebugPayload::from_value(&data)?;
                let record = relay_debug_payload(&payload, &self.block_ids, self.ticks)?;
                handler.debug_data_received(&record);
                self.history.debug.push(record);
            }
        }

        Ok(next_command)
    }

    fn sensor_dict(&self, sensor_values: &NamedValues) -> Result<BTreeMap<i64, f64>> {
        sensor_values
            .iter()
            .map(|(name, value)| {
                let id = self
                    .sensor_ids
                    .get(name)
                    .ok_or_else(|| LookupError::Sensor(name.clone()))?;
                Ok((*id, *value))
            })
            .collect()
    }

    fn zero_motor_command(&self) -> NamedValues {
        self.motor_ids.keys().map(|name| (name.clone(), 0.0)).collect()
    }

    /// Shut the remote session down and report its summary
    ///
    /// A no-op returning `None` unless the session is active, so it may be called
    /// any number of times. A failed shutdown request is logged, not returned.
    pub fn close(&mut self) -> Option<SessionSummary> {
        if !self.is_active() {
            return None;
        }

        self.shutdown_remote(self.session_id);

        let summary = SessionSummary::build(
            self.session_id,
            self.ticks,
            &self.config.motor_names(),
            &self.config.sensor_names(),
            &self.history,
        );

        self.reset_session_scope();
        self.stop.reset();
        self.state = SessionState::Closed;
        Some(summary)
    }

    /// Send `/shutdownSession` for `session_id`; failures are logged, not returned
    fn shutdown_remote(&mut self, session_id: i64) {
        let params = [("session_id", session_id.to_string())];
        match self.transport.post(SHUTDOWN_SESSION_PATH, &params, None) {
            Ok(reply) if reply.is_ok() => {
                info!("Session {} has been shut down.", session_id);
                match ShutdownSessionReply::from_body(reply.body.as_ref()) {
                    Ok(reply) => self.relay_session_logs(reply.session_log),
                    Err(e) => warn!("Session shutdown reply unreadable: {}", e),
                }
            }
            Ok(reply) => warn!("Session shutdown failed. Server returned HTTP {}", reply.status),
            Err(e) => warn!("Session shutdown failed: {}", e),
        }
    }

    fn reset_session_scope(&mut self) {
        self.session_id = NO_SESSION;
        self.sensor_ids.clear();
        self.motor_ids.clear();
        self.block_ids.clear();
        self.ticks = 0;
        self.history.clear();
    }

    fn relay_session_logs(&mut self, logs: Vec<String>) {
        if logs.is_empty() {
            return;
        }
        info!("Server messages received:");
        for message in &logs {
            info!(" - {}", message);
        }
        self.session_logs.extend(logs);
    }
}

fn check_registered(kind: EntryKind, declared: usize, registered: usize) -> Result<()> {
    if declared != registered {
        warn!(
            "[SESSION] Server registered {} {}s, {} declared",
            registered, kind, declared
        );
        return Err(ClientError::RegistrationMismatch {
            kind,
            declared,
            registered,
        });
    }
    Ok(())
}

impl<T: SessionTransport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.is_active() {
            debug!("[SESSION] Dropping active session {}", self.session_id);
            self.close();
        }
    }
}
