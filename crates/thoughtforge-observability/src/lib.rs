// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # thoughtforge-observability
//!
//! Logging setup shared by the ThoughtForge client crates and binaries.
//!
//! Provides a console subscriber with per-crate debug flag support and, behind the
//! `file-logging` feature, timestamped run folders with rolling log files.
//!
//! ## Features
//! - `file-logging`: File-based log rotation

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known ThoughtForge crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "thoughtforge",
    "thoughtforge-config",
    "thoughtforge-client",
    "thoughtforge-gym",
    "thoughtforge-runner",
];

/// Convert a crate name (`thoughtforge-client`) to its tracing target (`thoughtforge_client`).
///
/// Tracing targets are module paths, so the filter directives built from debug flags
/// must use the underscore form.
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
