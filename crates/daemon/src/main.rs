// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! waked: the wake power-management daemon.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wake_daemon::board::CharDevDio;
use wake_daemon::config::Settings;
use wake_daemon::{cleanup, lifecycle, run, spawn_signal_handler, startup, Config};

#[derive(Parser)]
#[command(name = "waked", version, about = "wake power-management daemon")]
struct Args {
    /// Configuration file (default: WAKE_CONFIG or <state dir>/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shorthand for --log-level debug
    #[arg(long)]
    debug: bool,

    /// Log level: debug, info, warn or error
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = match args.config.clone().map(Ok).unwrap_or_else(wake_daemon::env::config_path) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let registry = match settings.registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let config = match Config::from_settings(&settings) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match init_tracing(&config, &args) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: cannot initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Board open failure is fatal at startup.
    let driver = match CharDevDio::open(&config.device) {
        Ok(driver) => driver,
        Err(e) => {
            error!("Error: {e}");
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let lifecycle::StartupResult { daemon, listener, port } =
        match startup(config, registry, Box::new(driver)).await {
            Ok(result) => result,
            Err(e) => {
                error!("Error: {e}");
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        };

    // The ready line: `wake daemon start` and the restart relay wait for it.
    println!("waked listening on port {port}");

    spawn_signal_handler(Arc::clone(&daemon));
    run(Arc::clone(&daemon), listener).await;
    cleanup(&daemon).await;

    ExitCode::SUCCESS
}

fn init_tracing(
    config: &Config,
    args: &Args,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;
    let appender = tracing_appender::rolling::daily(&config.log_dir, "waked.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let level = if args.debug {
        "debug".to_string()
    } else {
        args.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(guard)
}
