// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, the accept loop, orderly shutdown, restart.

mod startup;
pub use startup::startup;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use wake_core::{Clock, ConnId, SystemClock};

use crate::board::{BoardError, PowerBoard};
use crate::config::{ConfigError, Settings};
use crate::fleet::Fleet;
use crate::listener::Link;
use crate::logfan::{ConnSink, FileSink, LogSink, TeeSink};

/// Daemon configuration, resolved from [`Settings`] and the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listening port; 0 binds an ephemeral loopback-only port.
    pub port: u16,
    /// Listening-port file; `None` disables it and the single-instance guard.
    pub port_file: Option<PathBuf>,
    /// Directory of the rotating daemon log.
    pub log_dir: PathBuf,
    /// I/O board device identifier.
    pub device: String,
}

impl Config {
    pub fn from_settings(settings: &Settings) -> Result<Self, LifecycleError> {
        let log_dir = match &settings.log_dir {
            Some(dir) => dir.clone(),
            None => crate::env::state_dir()?,
        };
        let port_file = if settings.port_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&settings.port_file))
        };
        Ok(Self { port: settings.port, port_file, log_dir, device: settings.device.clone() })
    }
}

/// The daemon: every shared resource, threaded explicitly through handlers.
pub struct Daemon {
    pub config: Config,
    pub board: PowerBoard,
    pub fleet: Mutex<Fleet>,
    /// Live connections by id: outbound mailbox, control mailbox, cancel.
    pub links: Mutex<HashMap<ConnId, Link>>,
    /// Requests the main loop to stop.
    pub shutdown: Notify,
    /// Set when the scheduled shutdown should re-exec the daemon.
    pub restart: AtomicBool,
    /// Log sink of the operator that asked for the shutdown, if any.
    pub shutdown_log: Mutex<Option<ConnSink>>,
    clock: SystemClock,
    next_conn: AtomicU64,
}

impl Daemon {
    pub(crate) fn new(config: Config, board: PowerBoard, fleet: Fleet) -> Self {
        Self {
            config,
            board,
            fleet: Mutex::new(fleet),
            links: Mutex::new(HashMap::new()),
            shutdown: Notify::new(),
            restart: AtomicBool::new(false),
            shutdown_log: Mutex::new(None),
            clock: SystemClock::new(),
            next_conn: AtomicU64::new(1),
        }
    }

    pub fn next_conn_id(&self) -> ConnId {
        ConnId(self.next_conn.fetch_add(1, Ordering::Relaxed))
    }

    /// Monotonic milliseconds for ping stamps.
    pub fn clock_ms(&self) -> u64 {
        self.clock.monotonic_ms()
    }
}

/// Result of daemon startup.
pub struct StartupResult {
    pub daemon: Arc<Daemon>,
    /// The bound listening socket; run it with [`run`].
    pub listener: TcpListener,
    /// The actual listening port (relevant with an ephemeral bind).
    pub port: u16,
}

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Another instance is already running.\n   If it is not the case, delete file {0:?}.")]
    AlreadyRunning(PathBuf),

    #[error("Cannot create port file {path:?}: {source}")]
    PortFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind listening socket: {0}")]
    BindFailed(#[source] std::io::Error),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accept loop. Returns when a shutdown is requested.
pub async fn run(daemon: Arc<Daemon>, listener: TcpListener) {
    let pinger = crate::pinger::spawn(Arc::clone(&daemon));
    let power_watch = crate::fleet::spawn_power_watch(Arc::clone(&daemon));

    loop {
        tokio::select! {
            _ = daemon.shutdown.notified() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("Connection accepted from {addr}.");
                    tokio::spawn(crate::listener::handle_connection(stream, Arc::clone(&daemon)));
                }
                Err(e) => error!("Accept error: {e}"),
            }
        }
    }

    pinger.abort();
    power_watch.abort();
    drop(listener);
    info!("Server stopped.");
}

/// Orderly cleanup after the accept loop exits.
///
/// Records produced here are forwarded to the operator that initiated the
/// shutdown. When a restart was requested, the new instance is spawned and
/// its early stdout relayed before the connection is released.
pub async fn cleanup(daemon: &Daemon) {
    let sink = daemon.shutdown_log.lock().clone();
    let log: Box<dyn LogSink> = match sink {
        Some(conn) => Box::new(TeeSink::from_sink(conn)),
        None => Box::new(FileSink),
    };

    log.debug("Starting clean up...");

    if let Some(port_file) = &daemon.config.port_file {
        if let Err(e) = std::fs::remove_file(port_file) {
            log.error(&format!("Cannot remove port file {}: {e}.", port_file.display()));
        }
    }

    if let Err(e) = daemon.board.reset() {
        // hardware error during cleanup: log and keep exiting
        log.critical(&format!("Hardware error while releasing the I/O board: {e}."));
    }

    if daemon.restart.load(Ordering::SeqCst) {
        if let Err(e) = respawn(log.as_ref()) {
            log.critical(&format!("Failed to restart daemon process: {e}."));
        }
    } else {
        log.info("Done.");
    }

    // Release the operator connection that carried the shutdown log and give
    // its writer task a moment to drain the final frames.
    *daemon.shutdown_log.lock() = None;
    drop(log);
    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// Spawn a fresh instance of this binary with the same arguments and relay
/// its first stdout line (the ready announcement) into our log.
fn respawn(log: &dyn LogSink) -> std::io::Result<()> {
    use std::io::{BufRead, BufReader};

    let exe = std::env::current_exe()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    log.info("Restarting process...");
    let mut child = std::process::Command::new(exe)
        .args(args)
        .stdout(std::process::Stdio::piped())
        .spawn()?;

    if let Some(stdout) = child.stdout.take() {
        let mut line = String::new();
        let mut reader = BufReader::new(stdout);
        if reader.read_line(&mut line).is_ok() {
            let line = line.trim_end();
            if !line.is_empty() {
                log.info(line);
            }
        }
    }
    Ok(())
}

/// First INT/HUP/TERM asks for an orderly shutdown; a second one exits
/// immediately without cleanup.
pub fn spawn_signal_handler(daemon: Arc<Daemon>) {
    tokio::spawn(async move {
        let mut seen = false;
        loop {
            let name = wait_for_signal().await;
            if !seen {
                seen = true;
                error!("{name} signal received. Terminating...");
                daemon.shutdown.notify_one();
            } else {
                error!("Another terminating signal ({name}) received. Terminating immediately.");
                std::process::exit(2);
            }
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(_) => return pending().await,
    };
    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(_) => return pending().await,
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => return pending().await,
    };
    tokio::select! {
        _ = interrupt.recv() => "INT",
        _ = hangup.recv() => "HUP",
        _ = terminate.recv() => "TERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "INT"
}

#[cfg(unix)]
async fn pending() -> &'static str {
    std::future::pending::<&'static str>().await
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
