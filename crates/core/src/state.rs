// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable per-machine runtime state.

use crate::machine::OsIndex;
use crate::status::Status;

/// Process-local identifier of an accepted connection.
///
/// The socket itself is owned by its handler task; machines reference the
/// attached agent connection only through this id, and the daemon maps ids
/// to outbound mailboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Runtime state of one machine. Lives as long as the daemon process.
#[derive(Debug, Clone)]
pub struct MachineState {
    pub status: Status,
    /// Defined iff `status == On`.
    pub current_os: Option<OsIndex>,
    /// OS the operator wants booted next; `None` is the "no request" sentinel.
    pub requested_os: Option<OsIndex>,
    /// Attached agent connection, if any. At most one per machine.
    pub conn: Option<ConnId>,
    /// Monotonic ms of the last ping sent; `None` while detached.
    pub last_ping_sent: Option<u64>,
    /// Monotonic ms of the last ping answered; `None` while detached.
    pub last_ping_acked: Option<u64>,
}

impl MachineState {
    pub fn new() -> Self {
        Self {
            status: Status::Off,
            current_os: None,
            requested_os: None,
            conn: None,
            last_ping_sent: None,
            last_ping_acked: None,
        }
    }

    /// Attach an agent connection, seeding the ping clocks as answered.
    pub fn attach(&mut self, conn: ConnId, now_ms: u64) {
        self.conn = Some(conn);
        self.last_ping_sent = Some(now_ms);
        self.last_ping_acked = Some(now_ms);
    }

    /// Drop the agent connection and its ping bookkeeping.
    pub fn detach(&mut self) {
        self.conn = None;
        self.last_ping_sent = None;
        self.last_ping_acked = None;
    }

    /// True when the previously sent ping was never answered.
    pub fn ping_overdue(&self) -> bool {
        self.last_ping_sent != self.last_ping_acked
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
