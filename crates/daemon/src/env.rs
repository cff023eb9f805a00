// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: WAKE_STATE_DIR > XDG_STATE_HOME/wake > ~/.local/state/wake
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("WAKE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("wake"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/wake"))
}

/// Configuration file path: WAKE_CONFIG > <state dir>/config.toml
pub fn config_path() -> Result<PathBuf, LifecycleError> {
    if let Ok(path) = std::env::var("WAKE_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    Ok(state_dir()?.join("config.toml"))
}

/// Ping scheduler period (default 10s, configurable via `WAKE_PING_INTERVAL_MS`).
pub fn ping_interval() -> Duration {
    std::env::var("WAKE_PING_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}

/// Poll period of the power watcher that advances machines waiting in
/// START_AFTER_STOPPED (default 1s, configurable via `WAKE_POWER_WATCH_MS`).
pub fn power_watch_interval() -> Duration {
    std::env::var("WAKE_POWER_WATCH_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(1))
}
