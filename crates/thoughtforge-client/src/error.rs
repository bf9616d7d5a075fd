// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Client error types

use std::fmt::{Display, Formatter};
use thiserror::Error;
use thoughtforge_config::ConfigError;

/// Which side of the session an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Sensor,
    Motor,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Sensor => write!(f, "sensor"),
            EntryKind::Motor => write!(f, "motor"),
        }
    }
}

/// A name or id that has no counterpart in the session's id maps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Sensor '{0}' is not registered in this session")]
    Sensor(String),

    #[error("Motor '{0}' is not part of the motor command")]
    Motor(String),

    #[error("Block id '{0}' has no registered name in this session")]
    Block(String),
}

/// Errors that can occur while running a ThoughtForge session
#[derive(Error, Debug)]
pub enum ClientError {
    /// The configuration declares an unsupported (or no) version
    #[error("Client params version {found:?} not supported, expected {expected}")]
    VersionMismatch { found: Option<i64>, expected: i64 },

    /// No API key was supplied
    #[error("ThoughtForge API key required")]
    MissingCredential,

    /// Loading or validating the configuration failed
    #[error("Configuration error")]
    Config(#[from] ConfigError),

    /// The request never produced an HTTP response (connection refused, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// `/initSession` returned a non-success status
    #[error("Session initialization failed: server returned HTTP {status}")]
    InitializationFailed { status: u16 },

    /// `/initSession` succeeded but handed back a negative session id
    #[error("Session initialization rejected by server (session_id={session_id})")]
    InitializationRejected { session_id: i64 },

    /// The server registered a different number of sensors or motors than declared
    #[error("Server registered {registered} {kind}s but {declared} were declared")]
    RegistrationMismatch {
        kind: EntryKind,
        declared: usize,
        registered: usize,
    },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// A server response could not be understood
    #[error("Unable to decode server response: {0}")]
    Decode(String),

    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),

    /// The update loop was started without an active session
    #[error("Session is not active")]
    SessionNotActive,

    /// User-requested cancellation; swallowed by `run_session` after cleanup
    #[error("Session interrupted")]
    Interrupted,

    /// Error raised by the embedding application's handler
    #[error("Session handler error")]
    Handler(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Render an error with its full `source()` chain, one cause per line
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
