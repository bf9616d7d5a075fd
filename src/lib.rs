//! # ThoughtForge - client SDK for remote simulation sessions
//!
//! ThoughtForge runs the learning model on a server; this SDK owns the control loop
//! on the client. Every tick the embedding application turns the latest motor
//! command into sensor readings, which are sent to the server in exchange for the
//! next motor command.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! thoughtforge = "0.1"  # Default: example environments on top of the client
//! ```
//!
//! ## Feature Flags
//!
//! The configuration loader and session client are always available.
//!
//! - **`gym`** (default): classic-control example environments
//! - **`observability`**: logging setup and per-crate debug flags
//! - **`file-logging`**: rolling log files in timestamped run folders
//!
//! ## Usage
//!
//! ```rust,no_run
//! use thoughtforge::prelude::*;
//!
//! let config = load_session_config("configs/cartpole.params")?;
//! let transport = HttpTransport::new(ConnectionSettings::from_env())?;
//! let mut session = Session::new(config, transport);
//! let mut handler = ExampleEnvironment::CartPole.handler(42);
//! let summary = run_session(&mut session, handler.as_mut(), None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: thoughtforge-config                        │
//! │  (.params loader, SessionConfig, ConnectionSettings)    │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Client: thoughtforge-client                            │
//! │  (HTTP transport, session lifecycle, update loop,       │
//! │   debug relay, session summary)                         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Environments: thoughtforge-gym                         │
//! │  (CartPole, MountainCar, Acrobot, Reacher handlers)     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use thoughtforge_config as config;

// Re-export client
pub use thoughtforge_client as client;

#[cfg(feature = "gym")]
pub use thoughtforge_gym as gym;

#[cfg(feature = "observability")]
pub use thoughtforge_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{
        load_saved_model, load_session_config, ConnectionSettings, Declaration, SessionConfig,
    };

    pub use crate::client::{
        run_session, ClientError, HttpTransport, ModelSnapshot, NamedValues, Session,
        SessionHandler, SessionOptions, SessionSummary,
    };

    #[cfg(feature = "gym")]
    pub use crate::gym::{Environment, ExampleEnvironment, GymHandler};
}
