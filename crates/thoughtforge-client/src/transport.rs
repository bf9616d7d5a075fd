// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! HTTP session transport
//!
//! Every server call is a blocking `POST` whose arguments travel as URL query
//! parameters; only the model snapshot at initialization uses a JSON body.

use crate::error::{ClientError, Result};
use reqwest::Url;
use serde_json::Value;
use thoughtforge_config::ConnectionSettings;
use tracing::{debug, warn};

/// Header carrying the caller's API key on every request
pub const API_KEY_HEADER: &str = "X-thoughtforge-key";

pub const INIT_SESSION_PATH: &str = "/initSession";
pub const UPDATE_SIM_PATH: &str = "/updateSim";
pub const SHUTDOWN_SESSION_PATH: &str = "/shutdownSession";

/// Outcome of a request that reached the server
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    /// Decoded JSON body; always `None` for non-success statuses
    pub body: Option<Value>,
}

impl HttpReply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    pub fn failed(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response channel to a ThoughtForge server
///
/// Implementations must not error on non-success HTTP statuses: they log the failure
/// and return an `HttpReply` whose `is_ok()` is false. `Err` is reserved for requests
/// that produced no response at all.
pub trait SessionTransport {
    /// API key attached to requests, if any
    fn api_key(&self) -> Option<&str>;

    /// Send a `POST` to `path` with URL-encoded `params` and an optional JSON body
    fn post(&mut self, path: &str, params: &[(&str, String)], body: Option<&Value>)
        -> Result<HttpReply>;
}

/// Blocking `reqwest` transport
pub struct HttpTransport {
    settings: ConnectionSettings,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport for the given connection settings
    ///
    /// Must not be called from inside an async runtime worker: the blocking client
    /// owns its own runtime.
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("HTTP client init failed: {e}")))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Build `http://host:port/path?k=v&...` with URL-encoded parameters
    pub fn build_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        build_url(&self.settings, path, params)
    }
}

/// Build a request URL for `settings`
pub fn build_url(settings: &ConnectionSettings, path: &str, params: &[(&str, String)]) -> Result<Url> {
    let base = format!("http://{}{}", settings.authority(), path);
    let url = if params.is_empty() {
        Url::parse(&base)
    } else {
        Url::parse_with_params(&base, params.iter().map(|(k, v)| (*k, v.as_str())))
    };
    url.map_err(|e| ClientError::Transport(format!("Invalid request URL {base}: {e}")))
}

impl SessionTransport for HttpTransport {
    fn api_key(&self) -> Option<&str> {
        self.settings.api_key.as_deref()
    }

    fn post(
        &mut self,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<HttpReply> {
        let url = self.build_url(path, params)?;
        debug!("POST {}", path);

        let mut request = self.client.post(url);
        if let Some(key) = self.settings.api_key.as_deref() {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            warn!("Request to {} failed. Server returned {}", path, status);
            return Ok(HttpReply::failed(status.as_u16()));
        }

        let text = response.text()?;
        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(&text).map_err(|e| {
                ClientError::Decode(format!("{} returned invalid JSON: {}", path, e))
            })?)
        };
        Ok(HttpReply {
            status: status.as_u16(),
            body,
        })
    }
}

impl<T: SessionTransport + ?Sized> SessionTransport for Box<T> {
    fn api_key(&self) -> Option<&str> {
        (**self).api_key()
    }

    fn post(
        &mut self,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<HttpReply> {
        (**self).post(path, params, body)
    }
}
