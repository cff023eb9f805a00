// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wake: operator CLI for the wake power-management daemon.
//!
//! Exit codes: 0 success, 1 local error (except `daemon stop` against an
//! already-stopped daemon, which is 0), 99 when usage help was shown.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod env;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wake",
    version,
    about = "Utility for starting and stopping computers using a remote power-management daemon"
)]
struct Cli {
    /// Daemon port (overrides the port file)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Listening-port file written by waked
    #[arg(long, global = true)]
    port_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Control the waked daemon process
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Print the status of the given machines (all configured when none given)
    Status {
        /// Reply with one bare state token per machine
        #[arg(long)]
        machine_readable: bool,
        names: Vec<String>,
    },
    /// Power a machine on, optionally requesting an operating system
    Start {
        machine: String,
        os: Option<String>,
    },
    /// Reboot a machine, optionally into another operating system
    Restart {
        machine: String,
        os: Option<String>,
    },
    /// Shut a machine down gracefully
    Stop { machine: String },
    /// Forcefully power a machine off (long power-button press)
    Kill { machine: String },
    /// Execute a command on a machine
    Command {
        machine: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
    },
    /// List configured machines and their operating systems
    List,
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon process
    Start,
    /// Ask the running daemon to stop
    Stop,
    /// Ask the running daemon to restart in place
    Restart,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                clap::error::ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(99),
            };
        }
    };
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::from(99);
    };

    if let Cmd::Daemon { action: DaemonAction::Start } = command {
        return client::daemon_start().await;
    }

    let ports = client::PortSource { port: cli.port, port_file: cli.port_file };
    let (argv, quiet_logs) = wire_argv(&command);
    client::run_command(&ports, argv, quiet_logs).await
}

/// The argument vector forwarded to the daemon, plus whether LOG frames
/// should be suppressed on output (machine-readable status).
fn wire_argv(command: &Cmd) -> (Vec<String>, bool) {
    let mut argv = Vec::new();
    let mut quiet = false;
    match command {
        Cmd::Daemon { action: DaemonAction::Start } => {
            // handled locally, never reaches the wire
        }
        Cmd::Daemon { action: DaemonAction::Stop } => {
            argv.extend(["daemon".to_string(), "stop".to_string()]);
        }
        Cmd::Daemon { action: DaemonAction::Restart } => {
            argv.extend(["daemon".to_string(), "restart".to_string()]);
        }
        Cmd::Status { machine_readable, names } => {
            argv.push("status".to_string());
            if *machine_readable {
                argv.push("--machine-readable".to_string());
                quiet = true;
            }
            argv.extend(names.iter().cloned());
        }
        Cmd::Start { machine, os } => {
            argv.push("start".to_string());
            argv.push(machine.clone());
            argv.extend(os.iter().cloned());
        }
        Cmd::Restart { machine, os } => {
            argv.push("restart".to_string());
            argv.push(machine.clone());
            argv.extend(os.iter().cloned());
        }
        Cmd::Stop { machine } => {
            argv.extend(["stop".to_string(), machine.clone()]);
        }
        Cmd::Kill { machine } => {
            argv.extend(["kill".to_string(), machine.clone()]);
        }
        Cmd::Command { machine, argv: command_argv } => {
            argv.extend(["command".to_string(), machine.clone()]);
            argv.extend(command_argv.iter().cloned());
        }
        Cmd::List => argv.push("list".to_string()),
    }
    (argv, quiet)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
