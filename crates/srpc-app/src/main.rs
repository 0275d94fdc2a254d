mod bridge;
mod cli;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use srpc_common::SrpcError;
use srpc_config::SrpcConfig;

use crate::bridge::Bridge;
use crate::cli::Command;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Logging starts at the override (or default) level and is adjusted
    // once the config file has been read.
    let log = logging::init_logging(args.log_level.unwrap_or_default());

    tracing::info!("SRPC v{} starting...", env!("CARGO_PKG_VERSION"));

    let (config_path, config) = match resolve_config(args.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!("Cannot load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let level = args.log_level.unwrap_or(config.logging.level);
    if let Err(e) = log.set_level(level) {
        tracing::warn!("{e}");
    }

    let mut bridge = Bridge::new(config, log);

    match args.command.unwrap_or(Command::Start) {
        Command::Start => run(&mut bridge).await,
        Command::LogLevel { level } => {
            if let Err(e) = bridge.set_log_level(level) {
                tracing::error!("{e}");
                return ExitCode::FAILURE;
            }
            persist(&bridge, &config_path)
        }
        Command::AutoStart { enabled } => {
            bridge.set_auto_start(enabled);
            persist(&bridge, &config_path)
        }
    }
}

/// Locate and read the config file, creating the default when it is missing.
/// An unreadable or malformed file is an error; it is never replaced.
fn resolve_config(path_override: Option<&str>) -> Result<(PathBuf, SrpcConfig), SrpcError> {
    let path = match path_override {
        Some(path) => {
            tracing::info!("Using config override: {path}");
            PathBuf::from(path)
        }
        None => srpc_config::default_config_path()?,
    };
    let config = srpc_config::load_or_create(&path)?;
    Ok((path, config))
}

async fn run(bridge: &mut Bridge) -> ExitCode {
    // Count problems reported while serving for the shutdown summary.
    let faults = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&faults);
    let handler = bridge.add_log_handler(move |record| {
        if record.level <= tracing::Level::WARN {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    if let Err(e) = bridge.start().await {
        tracing::error!("Failed to start server: {e}");
        return ExitCode::FAILURE;
    }

    let status = bridge.status().await;
    tracing::info!(
        running = status.running,
        channel = %status.channel,
        producers = status.producers,
        relay = ?status.relay_addr,
        log_level = %status.log_level,
        auto_start = status.auto_start,
        "Server started successfully"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    tracing::info!("Shutting down...");
    bridge.stop().await;
    bridge.remove_log_handler(handler);
    tracing::info!(
        warnings = faults.load(Ordering::Relaxed),
        "Shutdown complete"
    );
    ExitCode::SUCCESS
}

fn persist(bridge: &Bridge, path: &Path) -> ExitCode {
    match srpc_config::save_config_to_path(bridge.config(), path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Configuration saved");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to save configuration: {e}");
            ExitCode::FAILURE
        }
    }
}
