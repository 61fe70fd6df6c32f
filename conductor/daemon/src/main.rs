//! Whiteboard Daemon
//!
//! HTTP server for the whiteboard command pipeline. Clients post commands and
//! receive either a batched JSON response or an NDJSON stream of actions.
//!
//! # Usage
//!
//! ```bash
//! # Start with ~/.config/whiteboard/conductor.toml (if present)
//! whiteboard-daemon
//!
//! # Custom config and port
//! whiteboard-daemon --config ./conductor.toml --port 9000
//!
//! # No model calls, server-side demo board
//! whiteboard-daemon --offline --demo
//!
//! # With verbose logging
//! RUST_LOG=debug whiteboard-daemon
//! ```
//!
//! # Environment Variables
//!
//! - `WHITEBOARD_CONFIG`: Config file path
//! - `WHITEBOARD_*`: Per-setting overrides (see `whiteboard_conductor::config`)
//! - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY`: Backend credentials
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! # Signals
//!
//! - SIGTERM/SIGINT: Graceful shutdown

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use whiteboard_conductor::config::{default_config_path, load_config_from_path};
use whiteboard_conductor::{
    ConfigOverrides, Conductor, HttpTelemetry, LogTelemetry, Telemetry, WhiteboardConfig,
};

use server::{AppState, DemoBoard};

/// Whiteboard command daemon
#[derive(Debug, Parser)]
#[command(name = "whiteboard-daemon", version, about)]
struct Args {
    /// Config file (defaults to ~/.config/whiteboard/conductor.toml)
    #[arg(long, env = "WHITEBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Model id for simple commands
    #[arg(long)]
    fast_model: Option<String>,

    /// Model id for creative commands
    #[arg(long)]
    creative_model: Option<String>,

    /// Wait before flushing connectors on the demo board
    #[arg(long)]
    settle_delay_ms: Option<u64>,

    /// Use the scripted backend instead of calling any model
    #[arg(long)]
    offline: bool,

    /// Apply batched commands to a server-side in-memory board
    #[arg(long)]
    demo: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new().with_offline(self.offline);
        if let Some(bind) = &self.bind {
            overrides = overrides.with_bind_address(bind.clone());
        }
        if let Some(port) = self.port {
            overrides = overrides.with_port(port);
        }
        if let Some(model) = &self.fast_model {
            overrides = overrides.with_fast_model(model.clone());
        }
        if let Some(model) = &self.creative_model {
            overrides = overrides.with_creative_model(model.clone());
        }
        if let Some(ms) = self.settle_delay_ms {
            overrides = overrides.with_settle_delay_ms(ms);
        }
        overrides
    }
}

fn telemetry(config: &WhiteboardConfig) -> anyhow::Result<Arc<dyn Telemetry>> {
    match (config.telemetry_enabled, &config.telemetry_endpoint) {
        (true, Some(endpoint)) => {
            let exporter = HttpTelemetry::new(endpoint.clone(), config.telemetry_key())
                .context("failed to build telemetry client")?;
            info!(%endpoint, "Exporting traces over HTTP");
            Ok(Arc::new(exporter))
        }
        _ => Ok(Arc::new(LogTelemetry)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("whiteboard_daemon=info".parse()?)
                .add_directive("whiteboard_conductor=info".parse()?),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    info!(pid = std::process::id(), "Starting whiteboard daemon");

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))
        .context("failed to load configuration")?;
    args.overrides().apply(&mut config);
    info!(
        source = %config.source(),
        fast = %config.fast.model,
        fast_provider = ?config.fast.provider,
        creative = %config.creative.model,
        creative_provider = ?config.creative.provider,
        "Configuration loaded"
    );

    let conductor = Conductor::from_config(&config)
        .context("failed to connect model backends")?
        .with_telemetry(telemetry(&config)?);

    let mut state = AppState::new(conductor);
    if args.demo {
        info!(settle_delay = ?config.settle_delay, "Demo board enabled");
        state = state.with_demo_board(DemoBoard::new(config.settle_delay));
    }

    server::run(state, &config.bind_address, config.port).await
}
