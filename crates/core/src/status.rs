// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine power status.

use serde::{Deserialize, Serialize};

/// The seven externally visible machine states.
///
/// `Display` yields the literal protocol strings; `status --machine-readable`
/// replies consist of exactly one of these tokens per machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// No power, no agent connection.
    Off,
    /// Power sensed, agent not yet connected.
    Starting,
    /// Power and a live agent connection.
    On,
    /// Shutdown requested, power still present.
    Stopping,
    /// Powered but the agent connection was lost.
    Frozen,
    /// Operator asked to start while the machine is still shutting down.
    StartAfterStopped,
    /// Operator asked to stop while the machine is still booting.
    StopAfterStarted,
}

crate::simple_display! {
    Status {
        Off => "OFF",
        Starting => "STARTING",
        On => "ON",
        Stopping => "STOPPING",
        Frozen => "FROZEN",
        StartAfterStopped => "START_AFTER_STOPPED",
        StopAfterStarted => "STOP_AFTER_STARTED",
    }
}

impl Status {
    /// Parse one of the seven protocol tokens.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OFF" => Some(Status::Off),
            "STARTING" => Some(Status::Starting),
            "ON" => Some(Status::On),
            "STOPPING" => Some(Status::Stopping),
            "FROZEN" => Some(Status::Frozen),
            "START_AFTER_STOPPED" => Some(Status::StartAfterStopped),
            "STOP_AFTER_STARTED" => Some(Status::StopAfterStarted),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
