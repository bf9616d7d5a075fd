// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Top-level session driver

use crate::error::{error_chain, ClientError, Result};
use crate::handler::SessionHandler;
use crate::session::Session;
use crate::snapshot::ModelSnapshot;
use crate::summary::SessionSummary;
use crate::transport::SessionTransport;
use tracing::{error, info};

/// Initialize `session`, run the update loop with `handler`, then close it
///
/// The remote session is shut down on every exit path. Errors are logged with
/// their cause chain and returned after the session is closed, except
/// [`ClientError::Interrupted`], which ends the run normally.
///
/// Returns the summary produced by the close, or `None` if initialization never
/// produced an active session.
pub fn run_session<T, H>(
    session: &mut Session<T>,
    handler: &mut H,
    snapshot: Option<&ModelSnapshot>,
) -> Result<Option<SessionSummary>>
where
    T: SessionTransport,
    H: SessionHandler + ?Sized,
{
    let outcome = session
        .initialize(snapshot)
        .and_then(|_| session.run(handler));
    let summary = session.close();

    match outcome {
        Ok(()) => Ok(summary),
        Err(ClientError::Interrupted) => {
            info!("Session interrupted; shut down cleanly");
            Ok(summary)
        }
        Err(e) => {
            error!("Session ended with error: {}", error_chain(&e));
            Err(e)
        }
    }
}
