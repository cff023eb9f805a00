// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One connection to the daemon: announce, then serve requests until EOF.

use tokio::net::TcpStream;
use tracing::{error, info};

use wake_wire::{read_frame, write_frame, AgentMsg, DaemonMsg, MsgType};

pub struct Session {
    pub server: String,
    pub name: String,
    pub platform: String,
    pub partition: String,
}

/// Why a session ended; decides the reconnect behavior.
pub enum SessionEnd {
    ConnectFailed,
    Disconnected,
    ShutdownRequested,
}

impl Session {
    pub async fn run(&self) -> SessionEnd {
        let stream = match TcpStream::connect(&self.server).await {
            Ok(stream) => stream,
            Err(_) => return SessionEnd::ConnectFailed,
        };
        let (mut reader, mut writer) = stream.into_split();

        let hello = AgentMsg::GotAlive {
            machine: self.name.clone(),
            platform: self.platform.clone(),
            partition: self.partition.clone(),
        };
        info!("Sending \"Got alive\" message (this computer name: {}).", self.name);
        if write_frame(&mut writer, MsgType::Computer, &hello.encode()).await.is_err() {
            return SessionEnd::Disconnected;
        }

        loop {
            let frame = match read_frame(&mut reader).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return SessionEnd::Disconnected,
                Err(e) => {
                    error!("Connection error: {e}");
                    return SessionEnd::Disconnected;
                }
            };

            match frame.msg {
                MsgType::Computer => match DaemonMsg::decode(&frame.payload) {
                    Ok(DaemonMsg::Shutdown) => {
                        info!("Shutting down...");
                        run_command(&shutdown_argv()).await;
                        return SessionEnd::ShutdownRequested;
                    }
                    Ok(DaemonMsg::Restart) => {
                        info!("Rebooting...");
                        run_command(&reboot_argv()).await;
                    }
                    Ok(DaemonMsg::Command { argv }) => {
                        if argv.is_empty() {
                            error!("Error: No command specified.");
                        } else {
                            run_command(&argv).await;
                        }
                    }
                    Err(e) => error!("Unknown computer message: {e}"),
                },
                MsgType::PingRequest => {
                    if write_frame(&mut writer, MsgType::PingAnswer, &frame.payload)
                        .await
                        .is_err()
                    {
                        return SessionEnd::Disconnected;
                    }
                }
                MsgType::Log => {
                    info!("Server info: {}", String::from_utf8_lossy(&frame.payload));
                }
                _ => error!("Unknown message type {}.", frame.msg.tag()),
            }
        }
    }
}

/// Spawn a subprocess, capture combined stdout/stderr, report the exit code.
async fn run_command(argv: &[String]) {
    let Some(program) = argv.first() else { return };
    info!("Command execution request: {argv:?}.");

    let output = tokio::process::Command::new(program)
        .args(&argv[1..])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            let combined = combined.trim_end();
            if !combined.is_empty() {
                info!("{combined}");
            }
            match output.status.code() {
                Some(0) => info!("Command {argv:?} succeed."),
                Some(code) => error!("Command {argv:?} returned error code {code}."),
                None => error!("Command {argv:?} was terminated by a signal."),
            }
        }
        Err(e) => error!("Error: Failed to run command {argv:?}: {e}."),
    }
}

/// Schedule a local shutdown in one minute, OS-appropriately.
fn shutdown_argv() -> Vec<String> {
    if cfg!(windows) {
        vec!["shutdown".into(), "/s".into(), "/t".into(), "60".into()]
    } else {
        vec!["sudo".into(), "shutdown".into(), "-h".into(), "+1".into()]
    }
}

fn reboot_argv() -> Vec<String> {
    if cfg!(windows) {
        vec!["shutdown".into(), "/r".into(), "/t".into(), "1".into()]
    } else {
        vec!["sudo".into(), "reboot".into()]
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
