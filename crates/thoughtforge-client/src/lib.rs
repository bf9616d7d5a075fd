// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! ThoughtForge client - drive a remote ThoughtForge simulation session over HTTP
//!
//! A session registers the sensors and motors declared in a [`SessionConfig`], then
//! runs a blocking control loop: every tick the embedding application's
//! [`SessionHandler`] receives the latest motor command and returns fresh sensor
//! readings, which are sent to the server in exchange for the next motor command.
//!
//! # Quick Start
//!
//! ```ignore
//! use thoughtforge_client::{run_session, HttpTransport, NamedValues, Session, SessionHandler};
//! use thoughtforge_config::{load_session_config, ConnectionSettings};
//!
//! struct Echo;
//!
//! impl SessionHandler for Echo {
//!     fn update(&mut self, motors: &NamedValues) -> thoughtforge_client::Result<NamedValues> {
//!         let force = motors.get("force").copied().unwrap_or(0.0);
//!         Ok(NamedValues::from([("pos".to_string(), force)]))
//!     }
//! }
//!
//! let config = load_session_config("configs/example.params")?;
//! let transport = HttpTransport::new(ConnectionSettings::from_env())?;
//! let mut session = Session::new(config, transport);
//! let summary = run_session(&mut session, &mut Echo, None)?;
//! ```
//!
//! # Lifecycle
//!
//! `Uninitialized -> Initializing -> Active -> Closed`, with `Initializing -> Failed`
//! when the server rejects the session or registers the wrong number of sensors or
//! motors. [`run_session`] closes the remote session on every exit path.
//!
//! # Error Handling
//!
//! Initialization errors are fatal. A failed update request is logged and the tick
//! completes with an all-zero motor command. Lookup errors (unregistered sensor
//! names, unknown block ids) end the session.

pub mod error;
pub mod handler;
pub mod protocol;
pub mod runner;
pub mod session;
pub mod snapshot;
pub mod summary;
pub mod telemetry;
pub mod transport;

pub use error::{ClientError, EntryKind, LookupError, Result};
pub use handler::{handler_fn, motor_value, FnHandler, NamedValues, SessionHandler, SessionInfo};
pub use runner::run_session;
pub use session::{Session, SessionOptions, SessionState, StopHandle};
pub use snapshot::ModelSnapshot;
pub use summary::{SessionHistory, SessionSummary, ValueStats, ValueSummary};
pub use telemetry::{DebugPayload, DebugRecord};
pub use transport::{HttpReply, HttpTransport, SessionTransport, API_KEY_HEADER};

pub use thoughtforge_config::{SessionConfig, CURRENT_CLIENT_PARAMS_VERSION};
