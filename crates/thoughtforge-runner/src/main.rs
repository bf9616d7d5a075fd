// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

use thoughtforge_client::{run_session, HttpTransport, ModelSnapshot, Session, SessionOptions};
use thoughtforge_config::{
    apply_cli_overrides, load_saved_model, load_session_config, ConnectionSettings, SessionConfig,
};
use thoughtforge_gym::ExampleEnvironment;
use thoughtforge_observability::{
    debug_flags_help, init_logging, CrateDebugFlags, LoggingConfig, DEBUG_ENV_VAR,
};

/// ThoughtForge Runner - drive an example environment with a remote ThoughtForge session
#[derive(Parser, Debug)]
#[command(name = "thoughtforge-runner", version, author, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Example environment to simulate (cartpole, mountaincar, acrobot, reacher)
    #[arg(short, long, default_value = "cartpole")]
    env: ExampleEnvironment,

    /// Session config file (defaults to configs/<env>.params)
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Saved model file to start from instead of a params file
    #[arg(short, long, conflicts_with = "params")]
    model: Option<PathBuf>,

    /// Server host (overrides HOST / THOUGHTFORGE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides PORT / THOUGHTFORGE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// API key (overrides THOUGHTFORGE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Stop after this many ticks (runs until Ctrl+C otherwise)
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Seed for environment resets
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Ask the server for debug telemetry regardless of the config file
    #[arg(long, default_value_t = false)]
    collect_debug: bool,

    /// Directory for log run folders (requires the file-logging feature)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    /// Connection overrides keyed the way `apply_cli_overrides` expects
    fn connection_overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(host) = &self.host {
            overrides.insert("host".to_string(), host.clone());
        }
        if let Some(port) = self.port {
            overrides.insert("port".to_string(), port.to_string());
        }
        if let Some(api_key) = &self.api_key {
            overrides.insert("api_key".to_string(), api_key.clone());
        }
        if let Some(timeout) = self.timeout_secs {
            overrides.insert("timeout_secs".to_string(), timeout.to_string());
        }
        overrides
    }
}

/// Split `--debug-*` flags (handled by the observability crate) from clap arguments
fn split_debug_args<I>(args: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    args.into_iter().partition(|arg| arg.starts_with("--debug-"))
}

fn load_session(args: &Args) -> anyhow::Result<(SessionConfig, Option<ModelSnapshot>)> {
    if let Some(model_path) = &args.model {
        info!("Loading saved model from: {}", model_path.display());
        let saved = load_saved_model(model_path)
            .with_context(|| format!("loading saved model {}", model_path.display()))?;
        let snapshot = ModelSnapshot::from_json(&saved.model_data)?;
        info!(
            "✓ Model loaded: {} weight arrays, {} values",
            snapshot.weights.len(),
            snapshot.values.len()
        );
        return Ok((saved.specification, Some(snapshot)));
    }

    let params_path = args
        .params
        .clone()
        .unwrap_or_else(|| PathBuf::from(args.env.default_params_file()));
    info!("Loading session config from: {}", params_path.display());
    let config = load_session_config(&params_path)
        .with_context(|| format!("loading session config {}", params_path.display()))?;
    Ok((config, None))
}

fn main() -> anyhow::Result<()> {
    let (debug_args, cli_args) = split_debug_args(std::env::args());
    let args = Args::parse_from(cli_args);

    let mut debug_flags = CrateDebugFlags::from_args(debug_args);
    if let Ok(value) = std::env::var(DEBUG_ENV_VAR) {
        debug_flags.merge_env_value(&value);
    }
    if args.verbose {
        debug_flags.enable_all();
    }
    let logging_config = LoggingConfig {
        log_dir: args.log_dir.clone(),
        ..LoggingConfig::default()
    };
    let _logging = init_logging(&debug_flags, &logging_config)?;

    let mut settings = ConnectionSettings::from_env();
    apply_cli_overrides(&mut settings, &args.connection_overrides());
    if settings.api_key.is_none() {
        warn!("No API key configured; set THOUGHTFORGE_API_KEY or pass --api-key");
    }

    let (mut config, snapshot) = load_session(&args)?;
    if args.collect_debug {
        config.enable_debug = true;
    }

    info!(
        "Connecting {} to {} ({} sensors, {} motors)",
        args.env,
        settings.authority(),
        config.declared_sensor_count(),
        config.declared_motor_count()
    );

    let transport = HttpTransport::new(settings)?;
    let options = SessionOptions {
        max_ticks: args.max_ticks,
    };
    let mut session = Session::with_options(config, transport, options);

    let stop = session.stop_handle();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received...");
        stop.request_stop();
    })?;

    let mut handler = args.env.handler(args.seed);
    info!("🔄 Running (Press Ctrl+C to stop)...");
    let summary = run_session(&mut session, handler.as_mut(), snapshot.as_ref())?;

    match summary {
        Some(summary) => info!(
            "✅ Session {} finished after {} ticks",
            summary.session_id, summary.ticks
        ),
        None => info!("Session ended without an active simulation"),
    }
    Ok(())
}
