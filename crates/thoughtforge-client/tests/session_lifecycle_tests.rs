// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Session initialization and shutdown against a scripted server

mod common;

use common::*;
use serde_json::json;
use thoughtforge_client::{
    run_session, ClientError, EntryKind, HttpReply, ModelSnapshot, Session, SessionState,
};
use thoughtforge_config::{Declaration, SessionConfig};

#[test]
fn initialize_sends_declarations_and_tunables() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);

    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(session.initialize(None).unwrap(), 7);
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.num_sensors(), 1);
    assert_eq!(session.num_motors(), 1);
    assert_eq!(session.session_logs(), ["session created".to_string()]);

    let init = &session.transport().calls_to(INIT)[0];
    assert_eq!(init.param("version"), Some("0"));
    assert_eq!(init.param("internal_timescale"), Some("1"));
    assert_eq!(init.param("ticks_per_sensor_sample"), Some("1"));
    assert_eq!(init.param("center_block_size_extra"), Some("0"));
    assert_eq!(init.param("center_block_stride"), Some("1"));
    assert_eq!(init.param("random_seed"), Some("42"));
    assert_eq!(init.param("debug_enabled"), Some("false"));
    assert_eq!(init.json_param("sensors"), json!([{"name": "pos"}]));
    assert_eq!(init.json_param("motors"), json!([{"name": "force"}]));
    assert!(init.body.is_none());
}

#[test]
fn initialize_sends_model_snapshot_body() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(1, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);
    let snapshot = ModelSnapshot::from_json(&json!({
        "weights": [[[1.0, 2.0], [3.0, 4.0]]],
        "values": [0.5, 0.25]
    }))
    .unwrap();

    session.initialize(Some(&snapshot)).unwrap();

    let init = &session.transport().calls_to(INIT)[0];
    assert_eq!(
        init.body,
        Some(json!({"weights": [[[1.0, 2.0], [3.0, 4.0]]], "values": [0.5, 0.25]}))
    );
}

#[test]
fn close_is_idempotent() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);
    session.initialize(None).unwrap();

    assert!(session.close().is_some());
    assert!(session.close().is_none());
    assert!(session.close().is_none());

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.session_id(), -1);
    assert_eq!(session.num_sensors(), 0);
    assert_eq!(session.num_motors(), 0);

    let shutdowns = session.transport().calls_to(SHUTDOWN);
    assert_eq!(shutdowns.len(), 1);
    assert_eq!(shutdowns[0].param("session_id"), Some("7"));
}

#[test]
fn close_before_initialize_sends_nothing() {
    let mut session = Session::new(pos_force_config(), ScriptedTransport::new());
    assert!(session.close().is_none());
    assert!(session.transport().calls.borrow().is_empty());
    assert_eq!(session.state(), SessionState::Uninitialized);
}

#[test]
fn negative_session_id_never_starts_loop() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(-1, json!({}), json!({})));
    let mut session = Session::new(pos_force_config(), transport);
    let mut handler = RecordingHandler::new(named(&[("pos", 1.0)]), 1);

    let err = thoughtforge_client::run_session(&mut session, &mut handler, None).unwrap_err();

    assert!(matches!(err, ClientError::InitializationRejected { session_id: -1 }));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(!handler.started);
    assert!(handler.seen.is_empty());
    assert!(session.transport().calls_to(UPDATE).is_empty());
    assert!(session.transport().calls_to(SHUTDOWN).is_empty());
}

#[test]
fn registration_count_mismatch_fails_session() {
    let config = SessionConfig::new(
        0,
        vec![Declaration::multiple(["angle1", "angle2"])],
        vec![Declaration::single("torque")],
    );
    let transport = ScriptedTransport::new().reply(INIT, init_reply(4, json!({"angle1": 0}), json!({"torque": 0})));
    let mut session = Session::new(config, transport);

    let err = session.initialize(None).unwrap_err();

    assert!(matches!(
        err,
        ClientError::RegistrationMismatch {
            kind: EntryKind::Sensor,
            declared: 2,
            registered: 1
        }
    ));
    assert_eq!(session.session_id(), -1);
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.run(&mut RecordingHandler::new(named(&[]), 1)).is_err());

    let shutdowns = session.transport().calls_to(SHUTDOWN);
    assert_eq!(shutdowns.len(), 1);
    assert_eq!(shutdowns[0].param("session_id"), Some("4"));
}

#[test]
fn motor_count_mismatch_shuts_down_server_session_once() {
    let transport = ScriptedTransport::new()
        .reply(INIT, init_reply(9, json!({"pos": 0}), json!({})))
        .reply(SHUTDOWN, HttpReply::ok(json!({"session_log": "[\"session 9 removed\"]"})));
    let events = transport.events.clone();
    let mut session = Session::new(pos_force_config(), transport);
    let mut handler = RecordingHandler::new(named(&[("pos", 0.0)]), 1);

    let err = run_session(&mut session, &mut handler, None).unwrap_err();

    assert!(matches!(
        err,
        ClientError::RegistrationMismatch {
            kind: EntryKind::Motor,
            declared: 1,
            registered: 0
        }
    ));
    assert_eq!(*events.borrow(), vec![INIT.to_string(), SHUTDOWN.to_string()]);
    assert_eq!(session.transport().calls_to(SHUTDOWN)[0].param("session_id"), Some("9"));
    assert!(session
        .session_logs()
        .iter()
        .any(|line| line == "session 9 removed"));
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn list_valued_names_count_per_element() {
    let config = SessionConfig::new(
        0,
        vec![Declaration::multiple(["angle1", "angle2"])],
        vec![Declaration::single("torque")],
    );
    let transport = ScriptedTransport::new().reply(
        INIT,
        init_reply(4, json!({"angle1": 0, "angle2": 1}), json!({"torque": 0})),
    );
    let mut session = Session::new(config, transport);
    assert_eq!(session.initialize(None).unwrap(), 4);
    assert_eq!(session.num_sensors(), 2);
}

#[test]
fn unsupported_version_is_rejected_before_any_request() {
    let mut config = pos_force_config();
    config.version = Some(3);
    let mut session = Session::new(config, ScriptedTransport::new());

    let err = session.initialize(None).unwrap_err();

    assert!(matches!(
        err,
        ClientError::VersionMismatch {
            found: Some(3),
            expected: 0
        }
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.transport().calls.borrow().is_empty());
}

#[test]
fn missing_api_key_is_rejected() {
    let mut session = Session::new(pos_force_config(), ScriptedTransport::new().without_api_key());
    assert!(matches!(
        session.initialize(None).unwrap_err(),
        ClientError::MissingCredential
    ));
    assert!(session.transport().calls.borrow().is_empty());
}

#[test]
fn http_failure_on_initialize_is_fatal() {
    let transport = ScriptedTransport::new().reply(INIT, HttpReply::failed(503));
    let mut session = Session::new(pos_force_config(), transport);
    assert!(matches!(
        session.initialize(None).unwrap_err(),
        ClientError::InitializationFailed { status: 503 }
    ));
    assert_eq!(session.state(), SessionState::Failed);
}

#[test]
fn reinitialize_closes_previous_session() {
    let transport = ScriptedTransport::new()
        .reply(INIT, init_reply(1, json!({"pos": 0}), json!({"force": 0})))
        .reply(INIT, init_reply(2, json!({"pos": 0}), json!({"force": 0})));
    let mut session = Session::new(pos_force_config(), transport);

    session.initialize(None).unwrap();
    assert_eq!(session.initialize(None).unwrap(), 2);

    let shutdowns = session.transport().calls_to(SHUTDOWN);
    assert_eq!(shutdowns.len(), 1);
    assert_eq!(shutdowns[0].param("session_id"), Some("1"));
}

#[test]
fn failed_shutdown_still_closes_locally() {
    let transport = ScriptedTransport::new()
        .reply(INIT, init_reply(7, json!({"pos": 0}), json!({"force": 0})))
        .reply(SHUTDOWN, HttpReply::failed(500));
    let mut session = Session::new(pos_force_config(), transport);
    session.initialize(None).unwrap();

    assert!(session.close().is_some());
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.session_id(), -1);
}

#[test]
fn dropping_active_session_shuts_it_down() {
    let transport = ScriptedTransport::new().reply(INIT, init_reply(9, json!({"pos": 0}), json!({"force": 0})));
    let calls = transport.calls.clone();
    {
        let mut session = Session::new(pos_force_config(), transport);
        session.initialize(None).unwrap();
    }

    let calls = calls.borrow();
    let last = calls.last().unwrap();
    assert_eq!(last.path, SHUTDOWN);
    assert_eq!(last.param("session_id"), Some("9"));
}
