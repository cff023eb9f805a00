// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine catalogue records: identity, wiring, installed operating systems.

use serde::{Deserialize, Serialize};

/// Index of an operating system within its machine's OS list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsIndex(pub usize);

/// One installable operating system on a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystem {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Partition identifier the agent reports in its `Got alive` message.
    pub partition: String,
    /// Argument vector run on the currently booted OS to arrange a reboot
    /// into this one.
    #[serde(default)]
    pub cmd_boot_to_self: Vec<String>,
    /// Argument vector run to arrange a reboot into the boot manager.
    #[serde(default)]
    pub cmd_boot_to_boot_manager: Vec<String>,
}

impl OperatingSystem {
    /// OS names and aliases match case-insensitively.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// A configured machine.
///
/// Immutable once loaded; mutable runtime state lives in
/// [`MachineState`](crate::state::MachineState).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Single bit identifying this machine on both the sense-input and
    /// drive-output ports. Zero means no wiring: the machine is tracked by
    /// connection presence only.
    #[serde(default)]
    pub power_mask: u8,
    #[serde(default)]
    pub operating_systems: Vec<OperatingSystem>,
    /// Name of the OS acting as boot selector on a multi-boot machine.
    #[serde(default)]
    pub boot_manager: Option<String>,
}

impl Machine {
    /// Machine names and aliases match exactly.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Whether the machine has a power-sense/drive bit on the I/O board.
    pub fn is_wired(&self) -> bool {
        self.power_mask != 0
    }

    pub fn os(&self, idx: OsIndex) -> &OperatingSystem {
        &self.operating_systems[idx.0]
    }

    pub fn os_by_name(&self, name: &str) -> Option<OsIndex> {
        self.operating_systems.iter().position(|os| os.answers_to(name)).map(OsIndex)
    }

    /// Match the partition identifier reported by an agent.
    pub fn os_by_partition(&self, partition: &str) -> Option<OsIndex> {
        if partition.is_empty() {
            return None;
        }
        self.operating_systems.iter().position(|os| os.partition == partition).map(OsIndex)
    }

    /// Whether the given OS is this machine's designated boot manager.
    pub fn is_boot_manager(&self, idx: OsIndex) -> bool {
        match &self.boot_manager {
            Some(name) => self.os(idx).name == *name,
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
