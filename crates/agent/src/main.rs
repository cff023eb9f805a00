// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wake-agent: companion agent running on each managed machine.
//!
//! Keeps an outbound TCP connection to the daemon, announces itself with
//! `Got alive`, executes shutdown/command/restart requests and answers
//! liveness pings. Reconnects with a fixed backoff when the daemon is away.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod session;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use session::{Session, SessionEnd};

#[derive(Parser)]
#[command(name = "wake-agent", version, about = "wake companion agent")]
struct Args {
    /// Daemon address, host:port
    #[arg(long)]
    server: String,

    /// Machine name announced to the daemon (default: this host's name)
    #[arg(long)]
    name: Option<String>,

    /// Partition identifier of the currently booted OS, as configured on
    /// the daemon side
    #[arg(long, default_value = "")]
    partition: String,

    /// Reconnect delay in seconds
    #[arg(long, default_value_t = 30)]
    retry_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let name = match args.name.clone().or_else(hostname) {
        Some(name) => name,
        None => {
            error!("cannot determine this machine's name; pass --name");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting wake agent. Connecting to the server {} as {name} (partition {:?}).",
        args.server, args.partition
    );

    loop {
        let session = Session {
            server: args.server.clone(),
            name: name.clone(),
            platform: platform().to_string(),
            partition: args.partition.clone(),
        };
        match session.run().await {
            SessionEnd::ShutdownRequested => break,
            SessionEnd::ConnectFailed => {
                info!(
                    "Can not connect to {}. Will try again in {} seconds...",
                    args.server, args.retry_secs
                );
                tokio::time::sleep(Duration::from_secs(args.retry_secs)).await;
            }
            SessionEnd::Disconnected => {
                info!("Connection closed. Trying to reconnect...");
            }
        }
    }

    info!("Agent terminated.");
    ExitCode::SUCCESS
}

/// Platform string selecting the daemon-side reboot semantics.
fn platform() -> &'static str {
    if cfg!(windows) {
        "win32"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else {
        "linux"
    }
}

fn hostname() -> Option<String> {
    nix::unistd::gethostname().ok()?.into_string().ok()
}
