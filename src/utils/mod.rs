//! Utility functions and helpers used throughout the application
//!
//! This module provides the retry policy, telemetry setup and command line
//! parsing shared by the rest of the crate.

pub mod retry;

// Re-export commonly used utilities
pub use retry::{BackoffStrategy, RetryOutcome, RetryPolicy};

/// Telemetry and observability utilities
pub mod telemetry {
    use anyhow::Result;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
    };

    fn env_filter(log_level: &str) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    }

    /// Initialize global tracing with the specified log level and format
    pub fn init(log_level: &str, log_format: &str) -> Result<()> {
        let registry = Registry::default().with(env_filter(log_level));

        match log_format {
            "json" => {
                registry
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_file(true)
                            .with_line_number(true),
                    )
                    .try_init()?;
            }
            "compact" => {
                registry
                    .with(fmt::layer().compact().with_target(false))
                    .try_init()?;
            }
            _ => {
                registry
                    .with(
                        fmt::layer()
                            .pretty()
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_file(true)
                            .with_line_number(true),
                    )
                    .try_init()?;
            }
        }

        Ok(())
    }

    /// Initialize stdout logging plus a daily-rotated log file.
    ///
    /// File output stops when the returned guard is dropped.
    pub fn init_with_file_rotation(
        log_level: &str,
        log_format: &str,
        log_directory: &str,
        file_name_prefix: &str,
    ) -> Result<WorkerGuard> {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, log_directory, file_name_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let registry = Registry::default().with(env_filter(log_level));

        if log_format == "json" {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(fmt::layer().compact().with_target(true))
                .try_init()?;
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .with(fmt::layer().compact().with_target(true))
                .try_init()?;
        }

        Ok(guard)
    }
}

/// Configuration argument parsing utilities
pub mod cli {
    use clap::Parser;

    /// Command line arguments for the application
    #[derive(Parser, Debug, Clone)]
    #[command(
        name = "risk-sync",
        about = "Keeps wallet risk profiles consistent across the frontend, bot service and database",
        version = env!("CARGO_PKG_VERSION")
    )]
    pub struct CliArgs {
        /// Path to configuration file
        #[arg(short, long, env = "CONFIG_PATH")]
        pub config_path: Option<String>,

        /// Logging level (trace, debug, info, warn, error)
        #[arg(short, long, env = "LOG_LEVEL")]
        pub log_level: Option<String>,

        /// Log format (json, pretty, compact)
        #[arg(long, env = "LOG_FORMAT")]
        pub log_format: Option<String>,

        /// Environment (development, staging, production)
        #[arg(short, long, env = "ENVIRONMENT")]
        pub environment: Option<String>,

        /// Wallet to reconcile; repeatable
        #[arg(long = "wallet")]
        pub wallets: Vec<String>,

        /// Run the periodic reconciliation sweep
        #[arg(long)]
        pub auto_reconcile: bool,

        /// Sweep period in seconds
        #[arg(long)]
        pub interval_secs: Option<u64>,

        /// Run a single sweep and exit
        #[arg(long)]
        pub once: bool,

        /// Metrics server port
        #[arg(long, env = "METRICS_PORT")]
        pub metrics_port: Option<u16>,
    }
}

// Re-export CLI utilities
pub use cli::CliArgs;

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from([
            "risk-sync",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--wallet",
            "11111111111111111111111111111112",
            "--wallet",
            "11111111111111111111111111111113",
            "--auto-reconcile",
            "--interval-secs",
            "30",
            "--metrics-port",
            "9100",
        ])
        .unwrap();

        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.log_format.as_deref(), Some("json"));
        assert_eq!(args.wallets.len(), 2);
        assert!(args.auto_reconcile);
        assert_eq!(args.interval_secs, Some(30));
        assert_eq!(args.metrics_port, Some(9100));
        assert!(!args.once);
    }

    #[test]
    fn test_cli_once_flag() {
        let args = CliArgs::try_parse_from(["risk-sync", "--once"]).unwrap();
        assert!(args.once);
        assert!(args.wallets.is_empty());
        assert!(args.interval_secs.is_none());
    }

    #[test]
    fn test_file_rotation_writes_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let guard = telemetry::init_with_file_rotation(
            "info",
            "json",
            dir.path().to_str().unwrap(),
            "risk-sync-test.log",
        )
        .unwrap();

        tracing::info!("rotation test line");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(!files.is_empty());
    }
}
