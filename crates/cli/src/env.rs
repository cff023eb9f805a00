// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI.

use std::path::PathBuf;

/// Daemon port override, from `WAKE_PORT`.
pub fn port() -> Option<u16> {
    std::env::var("WAKE_PORT").ok().and_then(|s| s.parse::<u16>().ok())
}

/// Listening-port file: WAKE_PORT_FILE > <state dir>/waked.port
pub fn port_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("WAKE_PORT_FILE") {
        return Some(PathBuf::from(path));
    }
    Some(state_dir()?.join("waked.port"))
}

/// State directory: WAKE_STATE_DIR > XDG_STATE_HOME/wake > ~/.local/state/wake
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("WAKE_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("wake"));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".local/state/wake"))
}
