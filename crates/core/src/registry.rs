// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static machine catalogue with alias lookup and load-time validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::machine::Machine;

/// Handle to a machine in the registry.
///
/// Connections and the ping scheduler hold this index instead of a reference
/// so nothing outside the fleet keeps machine state alive or mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineId(pub usize);

/// Validation errors raised when building a [`Registry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("alias {alias:?} is claimed by both {first:?} and {second:?}")]
    DuplicateAlias { alias: String, first: String, second: String },

    #[error("power bit {mask:#04x} is wired to both {first:?} and {second:?}")]
    DuplicateMask { mask: u8, first: String, second: String },

    #[error("machine {machine:?} names unknown boot manager OS {os:?}")]
    UnknownBootManager { machine: String, os: String },

    #[error("power mask {mask:#04x} of machine {machine:?} is not a single bit")]
    MultiBitMask { machine: String, mask: u8 },
}

/// Ordered, immutable catalogue of configured machines.
#[derive(Debug, Clone)]
pub struct Registry {
    machines: Vec<Machine>,
}

impl Registry {
    /// Build a registry, rejecting ambiguous aliases, shared or multi-bit
    /// power masks, and dangling boot-manager names.
    pub fn new(machines: Vec<Machine>) -> Result<Self, RegistryError> {
        for (i, m) in machines.iter().enumerate() {
            if m.power_mask != 0 && !m.power_mask.is_power_of_two() {
                return Err(RegistryError::MultiBitMask {
                    machine: m.name.clone(),
                    mask: m.power_mask,
                });
            }
            if let Some(bm) = &m.boot_manager {
                if m.os_by_name(bm).is_none() {
                    return Err(RegistryError::UnknownBootManager {
                        machine: m.name.clone(),
                        os: bm.clone(),
                    });
                }
            }
            for other in &machines[i + 1..] {
                if m.power_mask != 0 && m.power_mask == other.power_mask {
                    return Err(RegistryError::DuplicateMask {
                        mask: m.power_mask,
                        first: m.name.clone(),
                        second: other.name.clone(),
                    });
                }
                for alias in std::iter::once(&m.name).chain(m.aliases.iter()) {
                    if other.answers_to(alias) {
                        return Err(RegistryError::DuplicateAlias {
                            alias: alias.clone(),
                            first: m.name.clone(),
                            second: other.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(Self { machines })
    }

    /// Resolve a machine by canonical name or alias.
    pub fn find(&self, name: &str) -> Option<MachineId> {
        self.machines.iter().position(|m| m.answers_to(name)).map(MachineId)
    }

    pub fn machine(&self, id: MachineId) -> &Machine {
        &self.machines[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = MachineId> {
        (0..self.machines.len()).map(MachineId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MachineId, &Machine)> {
        self.machines.iter().enumerate().map(|(i, m)| (MachineId(i), m))
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
