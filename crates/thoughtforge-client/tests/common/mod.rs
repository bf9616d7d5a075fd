// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scripted in-memory transport shared by the session tests

#![allow(dead_code)]

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use thoughtforge_client::{ClientError, HttpReply, NamedValues, Result, SessionHandler};
use thoughtforge_config::{Declaration, SessionConfig};

pub const INIT: &str = "/initSession";
pub const UPDATE: &str = "/updateSim";
pub const SHUTDOWN: &str = "/shutdownSession";

/// One request as the session sent it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn json_param(&self, key: &str) -> Value {
        serde_json::from_str(self.param(key).unwrap()).unwrap()
    }
}

pub enum Scripted {
    Reply(HttpReply),
    Unreachable(String),
}

/// Observable ordering of handler calls and requests
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub struct ScriptedTransport {
    api_key: Option<String>,
    scripts: HashMap<String, VecDeque<Scripted>>,
    fallbacks: HashMap<String, HttpReply>,
    pub calls: Rc<RefCell<Vec<RecordedCall>>>,
    pub events: EventLog,
    pub in_flight: Rc<Cell<bool>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let mut fallbacks = HashMap::new();
        fallbacks.insert(UPDATE.to_string(), HttpReply::ok(json!({"motor_dict": {}, "session_log": "[]"})));
        fallbacks.insert(SHUTDOWN.to_string(), HttpReply::ok(json!({"session_log": "[]"})));
        Self {
            api_key: Some("test-key".to_string()),
            scripts: HashMap::new(),
            fallbacks,
            calls: Rc::new(RefCell::new(Vec::new())),
            events: Rc::new(RefCell::new(Vec::new())),
            in_flight: Rc::new(Cell::new(false)),
        }
    }

    pub fn without_api_key(mut self) -> Self {
        self.api_key = None;
        self
    }

    pub fn reply(mut self, path: &str, reply: HttpReply) -> Self {
        self.scripts
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted::Reply(reply));
        self
    }

    pub fn unreachable(mut self, path: &str, message: &str) -> Self {
        self.scripts
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted::Unreachable(message.to_string()));
        self
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }
}

impl thoughtforge_client::SessionTransport for ScriptedTransport {
    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn post(&mut self, path: &str, params: &[(&str, String)], body: Option<&Value>) -> Result<HttpReply> {
        assert!(!self.in_flight.get(), "request to {} overlaps another request", path);
        self.in_flight.set(true);

        self.calls.borrow_mut().push(RecordedCall {
            path: path.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            body: body.cloned(),
        });
        self.events.borrow_mut().push(path.to_string());

        let scripted = self.scripts.get_mut(path).and_then(VecDeque::pop_front);
        let outcome = match scripted {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Unreachable(message)) => Err(ClientError::Transport(message)),
            None => Ok(self
                .fallbacks
                .get(path)
                .cloned()
                .unwrap_or_else(|| panic!("no scripted reply for {}", path))),
        };

        self.in_flight.set(false);
        outcome
    }
}

/// `/initSession` reply with string-encoded id maps, as the server sends them
pub fn init_reply(session_id: i64, sensor_ids: Value, motor_ids: Value) -> HttpReply {
    HttpReply::ok(json!({
        "session_id": session_id,
        "sensor_ids": sensor_ids.to_string(),
        "motor_ids": motor_ids.to_string(),
        "session_log": "[\"session created\"]"
    }))
}

pub fn update_reply(motor_dict: Value) -> HttpReply {
    HttpReply::ok(json!({
        "motor_dict": motor_dict,
        "session_log": "[]"
    }))
}

/// Config with one sensor `pos` and one motor `force`
pub fn pos_force_config() -> SessionConfig {
    SessionConfig::new(
        0,
        vec![Declaration::single("pos")],
        vec![Declaration::single("force")],
    )
}

/// Handler that records each motor command and returns a fixed sensor reading,
/// stopping the session after `stop_after` updates
pub struct RecordingHandler {
    pub sensors: NamedValues,
    pub seen: Vec<NamedValues>,
    pub stop_after: usize,
    pub started: bool,
    pub ended: bool,
    pub events: Option<EventLog>,
    pub in_flight: Option<Rc<Cell<bool>>>,
    stop: Option<thoughtforge_client::StopHandle>,
}

impl RecordingHandler {
    pub fn new(sensors: NamedValues, stop_after: usize) -> Self {
        Self {
            sensors,
            seen: Vec::new(),
            stop_after,
            started: false,
            ended: false,
            events: None,
            in_flight: None,
            stop: None,
        }
    }

    pub fn observing(mut self, transport: &ScriptedTransport) -> Self {
        self.events = Some(transport.events.clone());
        self.in_flight = Some(transport.in_flight.clone());
        self
    }
}

impl SessionHandler for RecordingHandler {
    fn update(&mut self, motor_command: &NamedValues) -> Result<NamedValues> {
        if let Some(in_flight) = &self.in_flight {
            assert!(!in_flight.get(), "handler called while a request is in flight");
        }
        if let Some(events) = &self.events {
            events.borrow_mut().push("update".to_string());
        }
        self.seen.push(motor_command.clone());
        if self.seen.len() >= self.stop_after {
            if let Some(stop) = &self.stop {
                stop.request_stop();
            }
        }
        Ok(self.sensors.clone())
    }

    fn sim_started(&mut self, info: &thoughtforge_client::SessionInfo) -> Result<()> {
        self.started = true;
        self.stop = Some(info.stop.clone());
        Ok(())
    }

    fn sim_ended(&mut self) {
        self.ended = true;
    }
}

pub fn named(pairs: &[(&str, f64)]) -> NamedValues {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
