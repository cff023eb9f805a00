// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for this crate's tests.

use std::sync::Arc;

use wake_core::test_support::{bare_machine, dual_boot_machine};
use wake_core::{Machine, Registry};

use crate::board::{FakeDio, FakeDioHandle, PowerBoard};
use crate::fleet::Fleet;
use crate::lifecycle::{Config, Daemon};

pub fn test_config() -> Config {
    Config {
        port: 0,
        port_file: None,
        log_dir: std::env::temp_dir(),
        device: "fake".to_string(),
    }
}

/// A daemon over a fake I/O board with the given machines.
pub fn test_daemon(machines: Vec<Machine>) -> (Arc<Daemon>, FakeDioHandle) {
    let (dio, handle) = FakeDio::new();
    let board = PowerBoard::new(Box::new(dio)).unwrap();
    let registry = Registry::new(machines).unwrap();
    let daemon = Arc::new(Daemon::new(test_config(), board, Fleet::new(registry)));
    (daemon, handle)
}

/// The standard two-machine fleet: dual-boot `c2` on bit 0x02 plus an
/// unwired `p4`.
pub fn small_fleet() -> Vec<Machine> {
    vec![dual_boot_machine("c2", 0x02), bare_machine("p4", 0)]
}
