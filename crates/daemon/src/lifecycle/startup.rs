// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use wake_core::{Registry, Status};

use crate::board::{DioDriver, PowerBoard};
use crate::fleet::Fleet;

use super::{Config, Daemon, LifecycleError, StartupResult};

/// Start the daemon: board up (fatal on failure), initial power sweep,
/// port-file single-instance guard, listening socket, port announcement.
pub async fn startup(
    config: Config,
    registry: Registry,
    driver: Box<dyn DioDriver>,
) -> Result<StartupResult, LifecycleError> {
    // 1. Hardware first: nothing below makes sense without the board.
    let board = PowerBoard::new(driver)?;
    info!("I/O board initialized successfully.");

    // 2. Initial sweep: machines with their sense bit set boot as STARTING.
    let bits = board.sample()?;
    let mut fleet = Fleet::new(registry);
    let mut names = Vec::new();
    let mut powered = Vec::new();
    for id in fleet.registry().ids().collect::<Vec<_>>() {
        let machine = fleet.registry().machine(id);
        names.push(machine.name.clone());
        if machine.is_wired() && bits & machine.power_mask != 0 {
            powered.push(machine.name.clone());
            fleet.state_mut(id).status = Status::Starting;
        }
    }
    info!("Initializing computers: {}", join_or_none(&names));
    info!("Currently powered computers: {}", join_or_none(&powered));

    // 3. Port file: exclusive creation is the single-instance guard. When it
    // fails because the file exists, it belongs to the running daemon and is
    // not ours to remove.
    let mut port_file = None;
    if let Some(path) = &config.port_file {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    LifecycleError::AlreadyRunning(path.clone())
                } else {
                    LifecycleError::PortFile { path: path.clone(), source }
                }
            })?;
        port_file = Some(file);
    }

    // 4. Bind last, after all validation passed. A configured port listens
    // on all interfaces; port 0 stays loopback-only.
    let bind_result = if config.port != 0 {
        TcpListener::bind(("0.0.0.0", config.port)).await
    } else {
        TcpListener::bind(("127.0.0.1", 0)).await
    };
    let listener = match bind_result {
        Ok(listener) => listener,
        Err(e) => {
            remove_port_file(&config);
            return Err(LifecycleError::BindFailed(e));
        }
    };
    let port = listener.local_addr().map_err(LifecycleError::Io)?.port();

    // 5. Record the port so the CLI can find us.
    if let Some(mut file) = port_file {
        if let Err(source) = write!(file, "{port}").and_then(|_| file.flush()) {
            remove_port_file(&config);
            let path = config.port_file.clone().unwrap_or_default();
            return Err(LifecycleError::PortFile { path, source });
        }
    }

    info!("Waiting for connections on port {port}...");

    let daemon = Arc::new(Daemon::new(config, board, fleet));
    Ok(StartupResult { daemon, listener, port })
}

fn remove_port_file(config: &Config) {
    if let Some(path) = &config.port_file {
        let _ = std::fs::remove_file(path);
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
