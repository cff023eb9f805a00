// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-channel payloads.
//!
//! Both directions are JSON string lists with the action as the first
//! element, decoded once at the boundary into tagged variants.

use serde::de::Error as _;

use crate::frame::WireError;

/// Agent → daemon announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentMsg {
    /// `["Got alive", machine, platform, partition]`
    GotAlive { machine: String, platform: String, partition: String },
}

impl AgentMsg {
    pub fn encode(&self) -> Vec<u8> {
        let list = match self {
            AgentMsg::GotAlive { machine, platform, partition } => vec![
                "Got alive".to_string(),
                machine.clone(),
                platform.clone(),
                partition.clone(),
            ],
        };
        serde_json::to_vec(&list).unwrap_or_default()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let list: Vec<String> = serde_json::from_slice(payload)
            .map_err(|source| WireError::Malformed { kind: "computer", source })?;
        match list.first().map(String::as_str) {
            Some("Got alive") => Ok(AgentMsg::GotAlive {
                machine: list.get(1).cloned().unwrap_or_default(),
                platform: list.get(2).cloned().unwrap_or_default(),
                partition: list.get(3).cloned().unwrap_or_default(),
            }),
            _ => Err(WireError::Malformed {
                kind: "computer",
                source: serde_json::Error::custom("unknown agent message"),
            }),
        }
    }
}

/// Daemon → agent requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonMsg {
    /// Schedule a local shutdown in one minute.
    Shutdown,
    /// Spawn a subprocess, capture combined output, report the exit code.
    Command { argv: Vec<String> },
    /// OS-appropriate reboot.
    Restart,
}

impl DaemonMsg {
    pub fn encode(&self) -> Vec<u8> {
        let list: Vec<String> = match self {
            DaemonMsg::Shutdown => vec!["shutdown".to_string()],
            DaemonMsg::Command { argv } => {
                let mut l = vec!["command".to_string()];
                l.extend(argv.iter().cloned());
                l
            }
            DaemonMsg::Restart => vec!["restart".to_string()],
        };
        serde_json::to_vec(&list).unwrap_or_default()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let list: Vec<String> = serde_json::from_slice(payload)
            .map_err(|source| WireError::Malformed { kind: "computer", source })?;
        match list.first().map(String::as_str) {
            Some("shutdown") => Ok(DaemonMsg::Shutdown),
            Some("command") => Ok(DaemonMsg::Command { argv: list[1..].to_vec() }),
            Some("restart") => Ok(DaemonMsg::Restart),
            _ => Err(WireError::Malformed {
                kind: "computer",
                source: serde_json::Error::custom("unknown daemon message"),
            }),
        }
    }
}

#[cfg(test)]
#[path = "computer_tests.rs"]
mod tests;
