// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon settings and machine catalogue, loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use wake_core::{Machine, Registry, RegistryError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Settings as they appear in the config file.
///
/// ```toml
/// port = 9978
/// port_file = "/run/wake/waked.port"
/// device = "/dev/usb-dio0"
///
/// [[machine]]
/// name = "c2"
/// aliases = ["core2"]
/// power_mask = 0x02
///
/// [[machine.operating_systems]]
/// name = "linux"
/// partition = "/dev/sda5"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Listening port; 0 binds an ephemeral loopback-only port.
    #[serde(default)]
    pub port: u16,
    /// Path of the listening-port file; empty disables it (and with it the
    /// single-instance guard).
    #[serde(default)]
    pub port_file: String,
    /// Directory for the rotating daemon log. Defaults to the state dir.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Identifier of the digital I/O board device.
    pub device: String,
    #[serde(default, rename = "machine")]
    pub machines: Vec<Machine>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Build the validated machine registry.
    pub fn registry(&self) -> Result<Registry, ConfigError> {
        Ok(Registry::new(self.machines.clone())?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
