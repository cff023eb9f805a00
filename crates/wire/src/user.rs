// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-channel payloads.
//!
//! The CLI forwards its argv verbatim as a JSON string list; the daemon
//! decodes it once at the boundary into a typed [`Command`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::WireError;

/// Raw operator request: the CLI's argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRequest {
    pub argv: Vec<String>,
}

pub fn encode_user(req: &UserRequest) -> Vec<u8> {
    // a string list cannot fail to serialize
    serde_json::to_vec(req).unwrap_or_default()
}

pub fn decode_user(payload: &[u8]) -> Result<UserRequest, WireError> {
    serde_json::from_slice(payload).map_err(|source| WireError::Malformed { kind: "user", source })
}

/// Errors produced while parsing an operator argv into a [`Command`].
///
/// These are operator mistakes, not protocol failures: the daemon reports
/// them over the LOG channel and keeps the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownVerb(String),

    #[error("not enough arguments for daemon parameter")]
    MissingDaemonAction,

    #[error("unknown daemon action: {0}")]
    UnknownDaemonAction(String),

    #[error("no machine specified")]
    MissingMachine,

    #[error("no command specified")]
    MissingCommand,
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DaemonStop,
    DaemonRestart,
    Status { machine_readable: bool, names: Vec<String> },
    Start { machine: String, os: Option<String> },
    Restart { machine: String, os: Option<String> },
    Stop { machine: String },
    Kill { machine: String },
    Exec { machine: String, argv: Vec<String> },
    List,
}

impl Command {
    /// Decode an operator argv. The verb is the first element.
    pub fn parse(argv: &[String]) -> Result<Self, CommandParseError> {
        let verb = argv.first().ok_or(CommandParseError::Empty)?;
        let rest = &argv[1..];
        match verb.as_str() {
            "daemon" => match rest.first().map(String::as_str) {
                Some("stop") => Ok(Command::DaemonStop),
                Some("restart") => Ok(Command::DaemonRestart),
                Some(other) => Err(CommandParseError::UnknownDaemonAction(other.to_string())),
                None => Err(CommandParseError::MissingDaemonAction),
            },
            "status" => {
                let machine_readable =
                    rest.first().map(String::as_str) == Some("--machine-readable");
                let names = if machine_readable { &rest[1..] } else { rest };
                Ok(Command::Status { machine_readable, names: names.to_vec() })
            }
            "start" | "restart" => {
                let machine =
                    rest.first().cloned().ok_or(CommandParseError::MissingMachine)?;
                let os = rest.get(1).cloned();
                if verb == "start" {
                    Ok(Command::Start { machine, os })
                } else {
                    Ok(Command::Restart { machine, os })
                }
            }
            "stop" => Ok(Command::Stop {
                machine: rest.first().cloned().ok_or(CommandParseError::MissingMachine)?,
            }),
            "kill" => Ok(Command::Kill {
                machine: rest.first().cloned().ok_or(CommandParseError::MissingMachine)?,
            }),
            "command" => {
                let machine =
                    rest.first().cloned().ok_or(CommandParseError::MissingMachine)?;
                let argv = rest[1..].to_vec();
                if argv.is_empty() {
                    return Err(CommandParseError::MissingCommand);
                }
                Ok(Command::Exec { machine, argv })
            }
            "list" => Ok(Command::List),
            other => Err(CommandParseError::UnknownVerb(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
