//! Risk Profile Sync - reconciliation daemon
//!
//! Keeps each wallet's risk profile consistent across the frontend settings
//! table, the bot microservice and the database proxy.
//!
//! # Modes
//!
//! - **Daemon** (default): health monitoring plus, with `--auto-reconcile`,
//!   a periodic sweep over the configured wallets until SIGINT/SIGTERM
//! - **One-shot** (`--once`): a single sweep, then exit; the exit code is
//!   non-zero when any wallet could not be reconciled

use anyhow::{Context, Result};
use clap::Parser;
use risk_profile_sync::{
    application::Application,
    config::{AppConfig, CliArgs, ConfigLoader},
    utils::telemetry,
};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Application entry point with error reporting and graceful shutdown
#[tokio::main]
async fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("Failed to install color-eyre: {}", e);
        process::exit(1);
    }

    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Fatal application error: {:?}", e);

            eprintln!("\n❌ Application failed:");
            eprintln!("   {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("   Caused by: {}", cause);
            }

            process::exit(1);
        }
    }
}

/// Main application execution logic, returning the process exit code
async fn run() -> Result<i32> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli_args = CliArgs::parse();

    let config = ConfigLoader::new()
        .with_cli_args(cli_args.clone())
        .load()
        .await
        .context("Configuration loading failed")?;

    let _log_guard = init_telemetry(&config)?;

    info!("🚀 {} v{}", risk_profile_sync::NAME, risk_profile_sync::VERSION);
    log_configuration_summary(&config);

    let app = Application::build(config)
        .await
        .context("Application initialization failed")?;

    if cli_args.once {
        return run_once(&app).await;
    }

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    app.run(shutdown).await.context("Application runtime error")?;
    Ok(0)
}

/// Stdout logging, plus rotated files when a log directory is configured
fn init_telemetry(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let env = &config.environment;
    match &env.log_directory {
        Some(directory) => {
            let guard = telemetry::init_with_file_rotation(&env.log_level, &env.log_format, directory, "risk-sync.log")
                .context("Failed to initialize file logging")?;
            Ok(Some(guard))
        }
        None => {
            telemetry::init(&env.log_level, &env.log_format).context("Failed to initialize telemetry")?;
            Ok(None)
        }
    }
}

fn log_configuration_summary(config: &AppConfig) {
    info!("📊 Configuration Summary:");
    info!("   Environment: {}", config.environment);
    info!("   Settings table: {}", config.database.settings_table);
    info!("   Bot service: {}", config.bot_service.base_url);
    info!("   Wallets: {}", config.sync.wallets.len());
    info!(
        "   Auto reconcile: {} (every {}s)",
        config.sync.auto_reconcile, config.sync.reconcile_interval_secs
    );
    info!("   Metrics Enabled: {}", config.monitoring.enable_metrics);

    if config.is_development() {
        warn!("⚠️  Running in DEVELOPMENT mode");
    }
}

#[instrument(skip(app))]
async fn run_once(app: &Application) -> Result<i32> {
    if app.wallets().is_empty() {
        warn!("⚠️  No wallets configured; nothing to reconcile");
    }

    let report = app.reconcile_once().await;
    app.shutdown().await.context("Shutdown failed")?;

    Ok(if report.failed > 0 { 2 } else { 0 })
}

/// Cancel `token` on SIGINT or SIGTERM
fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                warn!("🛑 Received {}", signal);
                token.cancel();
            }
            Err(e) => error!("Failed to register shutdown signal handlers: {}", e),
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT (Ctrl+C)"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
