// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Update loop behaviour: tick sequencing, motor translation, degraded ticks,
//! debug relay and the end-of-session summary

mod common;

use common::*;
use serde_json::json;
use std::collections::BTreeMap;
use thoughtforge_client::{
    handler_fn, run_session, ClientError, DebugRecord, HttpReply, LookupError, NamedValues,
    Session, SessionHandler, SessionInfo, SessionOptions, SessionState, StopHandle,
};
use thoughtforge_config::{Declaration, SessionConfig};

#[test]
fn motor_command_from_reply_reaches_next_update() {
    let transport = ScriptedTransport::new()
        .reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})))
        .reply(UPDATE, update_reply(json!({"0": -0.3})));
    let mut session = Session::new(pos_force_config(), transport);
    let mut handler = RecordingHandler::new(named(&[("pos", 1.5)]), 2);

    run_session(&mut session, &mut handler, None).unwrap();

    assert_eq!(handler.seen, vec![named(&[("force", 0.0)]), named(&[("force", -0.3)])]);
    assert!(handler.started);
    assert!(handler.ended);

    let updates = session.transport().calls_to(UPDATE);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].param("session_id"), Some("7"));
    assert_eq!(updates[0].json_param("sensor_dict"), json!({"0": 1.5}));
    assert_eq!(updates[0].json_param("motor_ids_requested"), json!([0]));
    assert_eq!(updates[0].param("collect_debug_data"), Some("false"));
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn handler_and_requests_strictly_alternate() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let events = transport.events.clone();
    let mut handler = RecordingHandler::new(named(&[("pos", 0.0)]), 3).observing(&transport);
    let mut session = Session::new(pos_force_config(), transport);

    run_session(&mut session, &mut handler, None).unwrap();

    assert_eq!(
        *events.borrow(),
        vec![INIT, "update", UPDATE, "update", UPDATE, "update", UPDATE, SHUTDOWN]
    );
}

#[test]
fn missing_motor_id_defaults_to_zero() {
    let config = SessionConfig::new(
        0,
        vec![Declaration::single("pos")],
        vec![Declaration::single("force"), Declaration::single("torque")],
    );
    let transport = ScriptedTransport::new()
        .reply(INIT, init_reply(2, json!({"pos": 0}), json!({"force": 0, "torque": 1})))
        .reply(UPDATE, update_reply(json!({"0": 0.7})));
    let mut session = Session::new(config, transport);
    let mut handler = RecordingHandler::new(named(&[("pos", 0.0)]), 2);

    run_session(&mut session, &mut handler, None).unwrap();

    assert_eq!(handler.seen[1], named(&[("force", 0.7), ("torque", 0.0)]));
    let requested = session.transport().calls_to(UPDATE)[0].json_param("motor_ids_requested");
    assert_eq!(requested, json!([0, 1]));
}

#[test]
fn failed_update_degrades_to_zero_motor_output() {
    let transport = ScriptedTransport::new()
        .reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})))
        .reply(UPDATE, update_reply(json!({"0": 0.4})))
        .reply(UPDATE, HttpReply::failed(500))
        .reply(UPDATE, update_reply(json!({"0": 0.9})))
        .unreachable(UPDATE, "connection reset")
        .reply(UPDATE, update_reply(json!({"0": 0.2})));
    let mut session = Session::new(pos_force_config(), transport);
    let mut handler = RecordingHandler::new(named(&[("pos", 1.0)]), 6);

    let summary = run_session(&mut session, &mut handler, None).unwrap().unwrap();

    let forces: Vec<f64> = handler.seen.iter().map(|c| c["force"]).collect();
    assert_eq!(forces, vec![0.0, 0.4, 0.0, 0.9, 0.0, 0.2]);
    assert_eq!(summary.ticks, 6);
}

#[test]
fn unregistered_sensor_name_ends_session() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);
    let mut handler = RecordingHandler::new(named(&[("velocity", 1.0)]), 10);

    let err = run_session(&mut session, &mut handler, None).unwrap_err();

    assert!(matches!(err, ClientError::Lookup(LookupError::Sensor(name)) if name == "velocity"));
    assert!(handler.ended);
    assert!(session.transport().calls_to(UPDATE).is_empty());
    assert_eq!(session.transport().calls_to(SHUTDOWN).len(), 1);
}

#[test]
fn handler_error_closes_session_before_returning() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);
    let mut handler = handler_fn(|_: &NamedValues| Err(anyhow::anyhow!("environment crashed").into()));

    let err = run_session(&mut session, &mut handler, None).unwrap_err();

    assert!(matches!(err, ClientError::Handler(_)));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.transport().calls_to(SHUTDOWN).len(), 1);
}

#[test]
fn interruption_is_swallowed_after_cleanup() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);
    let mut calls = 0;
    let mut handler = handler_fn(|_: &NamedValues| {
        calls += 1;
        if calls == 3 {
            return Err(ClientError::Interrupted);
        }
        Ok(named(&[("pos", 0.0)]))
    });

    let summary = run_session(&mut session, &mut handler, None).unwrap();

    assert_eq!(summary.unwrap().ticks, 2);
    assert_eq!(session.transport().calls_to(SHUTDOWN).len(), 1);
}

#[test]
fn max_ticks_limits_the_loop() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let options = SessionOptions::default().with_max_ticks(3);
    let mut session = Session::with_options(pos_force_config(), transport, options);
    let mut handler = RecordingHandler::new(named(&[("pos", 0.0)]), usize::MAX);

    run_session(&mut session, &mut handler, None).unwrap();

    assert_eq!(handler.seen.len(), 3);
    assert_eq!(session.transport().calls_to(UPDATE).len(), 3);
}

#[test]
fn stop_requested_from_outside_is_seen_at_tick_boundary() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);
    let stop: StopHandle = session.stop_handle();
    let mut count = 0;
    let mut handler = handler_fn(move |_: &NamedValues| {
        count += 1;
        if count == 4 {
            stop.request_stop();
        }
        Ok(named(&[("pos", 0.0)]))
    });

    run_session(&mut session, &mut handler, None).unwrap();

    assert_eq!(session.transport().calls_to(UPDATE).len(), 4);
}

#[test]
fn stop_requested_before_initialize_is_honored() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);
    session.stop_sim();
    let mut handler = RecordingHandler::new(named(&[("pos", 0.0)]), usize::MAX);

    run_session(&mut session, &mut handler, None).unwrap();

    assert!(handler.seen.is_empty());
    assert!(session.transport().calls_to(UPDATE).is_empty());
    assert_eq!(session.transport().calls_to(SHUTDOWN).len(), 1);
    assert!(!session.stop_handle().is_requested());
}

#[test]
fn run_without_initialize_is_rejected() {
    let mut session = Session::new(pos_force_config(), ScriptedTransport::new());
    let mut handler = RecordingHandler::new(named(&[]), 1);
    assert!(matches!(
        session.run(&mut handler),
        Err(ClientError::SessionNotActive)
    ));
    assert!(!handler.started);
}

/// Collects debug records and stops after a fixed number of updates
struct DebugCollector {
    records: Vec<DebugRecord>,
    updates: usize,
    stop_after: usize,
    stop: Option<StopHandle>,
}

impl SessionHandler for DebugCollector {
    fn update(&mut self, _motor_command: &NamedValues) -> thoughtforge_client::Result<NamedValues> {
        self.updates += 1;
        if self.updates >= self.stop_after {
            if let Some(stop) = &self.stop {
                stop.request_stop();
            }
        }
        Ok(named(&[("pos", self.updates as f64)]))
    }

    fn sim_started(&mut self, info: &SessionInfo) -> thoughtforge_client::Result<()> {
        assert!(info.debug_enabled);
        assert_eq!(info.motor_names, vec!["force".to_string()]);
        self.stop = Some(info.stop.clone());
        Ok(())
    }

    fn debug_data_received(&mut self, record: &DebugRecord) {
        self.records.push(record.clone());
    }
}

fn debug_update_reply(force: f64, stability: f64) -> HttpReply {
    let debugging_data = json!({
        "global_stability_rate": 0.5,
        "global_energy_estimate": 10.0,
        "block_stability_rates": {"3": stability},
        "block_energy_estimates": {"3": 2.0},
        "block_stable_times": {"3": 40.0}
    });
    HttpReply::ok(json!({
        "motor_dict": {"0": force},
        "session_log": "[]",
        "debugging_data": debugging_data.to_string()
    }))
}

#[test]
fn debug_payload_is_relayed_by_block_name() {
    let init = HttpReply::ok(json!({
        "session_id": 5,
        "sensor_ids": "{\"pos\": 0}",
        "motor_ids": "{\"force\": 0}",
        "block_ids": "{\"armA\": 3}",
        "session_log": "[]"
    }));
    let transport = ScriptedTransport::new()
        .reply(INIT, init)
        .reply(UPDATE, debug_update_reply(1.0, 0.25))
        .reply(UPDATE, debug_update_reply(2.0, 0.75))
        .reply(UPDATE, debug_update_reply(3.0, 0.5));
    let mut session = Session::new(pos_force_config().with_debug(true), transport);
    let mut handler = DebugCollector {
        records: Vec::new(),
        updates: 0,
        stop_after: 3,
        stop: None,
    };

    let summary = run_session(&mut session, &mut handler, None).unwrap().unwrap();

    assert_eq!(handler.records.len(), 3);
    assert_eq!(
        handler.records[1].block_stability_rates,
        BTreeMap::from([("armA".to_string(), 0.75)])
    );
    assert_eq!(handler.records[2].tick, 2);

    let init_call = &session.transport().calls_to(INIT)[0];
    assert_eq!(init_call.param("debug_enabled"), Some("true"));
    let update_call = &session.transport().calls_to(UPDATE)[0];
    assert_eq!(update_call.param("collect_debug_data"), Some("true"));

    let force = summary.motor("force").unwrap().stats.unwrap();
    assert_eq!((force.min, force.max, force.median, force.mean), (0.0, 2.0, 1.0, 1.0));
    let pos = summary.sensor("pos").unwrap();
    assert_eq!(pos.samples, vec![1.0, 2.0, 3.0]);
    assert_eq!(
        summary.last_debug.unwrap().block_stability_rates["armA"],
        0.5
    );
}

#[test]
fn unknown_block_id_in_debug_payload_is_fatal() {
    let init = HttpReply::ok(json!({
        "session_id": 5,
        "sensor_ids": "{\"pos\": 0}",
        "motor_ids": "{\"force\": 0}",
        "block_ids": "{\"armA\": 3}",
        "session_log": "[]"
    }));
    let bad_debug = HttpReply::ok(json!({
        "motor_dict": {"0": 0.0},
        "session_log": "[]",
        "debugging_data": {"block_stability_rates": {"8": 0.1}}
    }));
    let transport = ScriptedTransport::new().reply(INIT, init).reply(UPDATE, bad_debug);
    let mut session = Session::new(pos_force_config().with_debug(true), transport);
    let mut handler = RecordingHandler::new(named(&[("pos", 0.0)]), 5);

    let err = run_session(&mut session, &mut handler, None).unwrap_err();

    assert!(matches!(err, ClientError::Lookup(LookupError::Block(id)) if id == "8"));
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn server_logs_accumulate_across_the_session() {
    let transport = ScriptedTransport::new()
        .reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})))
        .reply(
            UPDATE,
            HttpReply::ok(json!({"motor_dict": {}, "session_log": "[\"tick warning\"]"})),
        )
        .reply(SHUTDOWN, HttpReply::ok(json!({"session_log": "[\"session saved\"]"})));
    let mut session = Session::new(pos_force_config(), transport);
    let mut handler = RecordingHandler::new(named(&[("pos", 0.0)]), 1);

    run_session(&mut session, &mut handler, None).unwrap();

    assert_eq!(
        session.session_logs(),
        ["session created", "tick warning", "session saved"].map(String::from)
    );
}
