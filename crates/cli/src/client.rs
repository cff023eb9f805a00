// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon connection handling for the CLI.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use wake_wire::{encode_user, read_frame, write_frame, MsgType, UserRequest};

/// Where to find the daemon's port.
pub struct PortSource {
    pub port: Option<u16>,
    pub port_file: Option<PathBuf>,
}

impl PortSource {
    /// --port > WAKE_PORT > port file (--port-file > WAKE_PORT_FILE > default).
    fn resolve(&self) -> Result<u16, String> {
        if let Some(port) = self.port.or_else(crate::env::port) {
            return Ok(port);
        }
        let path = self
            .port_file
            .clone()
            .or_else(crate::env::port_file)
            .ok_or_else(|| "cannot determine the port file location".to_string())?;
        let text = std::fs::read_to_string(&path).map_err(|_| {
            format!(
                "Can not connect to waked process. It might be not running\n\
                 or can not access file \"{}\".",
                path.display()
            )
        })?;
        text.trim()
            .parse::<u16>()
            .map_err(|_| format!("port file \"{}\" is corrupt", path.display()))
    }
}

/// Send one command and stream the daemon's replies until EOF.
///
/// LOG frames are printed unless `quiet_logs` (machine-readable status);
/// USER frames are always printed.
pub async fn run_command(ports: &PortSource, argv: Vec<String>, quiet_logs: bool) -> ExitCode {
    let stopping_daemon = argv.first().map(String::as_str) == Some("daemon")
        && argv.get(1).map(String::as_str) == Some("stop");

    let port = match ports.resolve() {
        Ok(port) => port,
        Err(message) => {
            if stopping_daemon {
                println!("Daemon process already stopped.");
                return ExitCode::SUCCESS;
            }
            eprintln!("Error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let stream = match TcpStream::connect(("127.0.0.1", port)).await {
        Ok(stream) => stream,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            if stopping_daemon {
                println!("Daemon process already stopped.");
                return ExitCode::SUCCESS;
            }
            eprintln!("Daemon process not running or can not connect to it.");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error: Can not connect to the daemon process.\n   ({e})");
            return ExitCode::FAILURE;
        }
    };

    let (mut reader, mut writer) = stream.into_split();
    let payload = encode_user(&UserRequest { argv });
    if let Err(e) = write_frame(&mut writer, MsgType::User, &payload).await {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }
    // Half-close: the daemon replies until it has processed the command,
    // then sees our EOF and closes its side.
    if let Err(e) = writer.shutdown().await {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => match frame.msg {
                MsgType::Log if !quiet_logs => {
                    println!("{}", String::from_utf8_lossy(&frame.payload));
                }
                MsgType::Log => {}
                MsgType::User => {
                    println!("{}", String::from_utf8_lossy(&frame.payload));
                }
                _ => {}
            },
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

/// `wake daemon start`: spawn the sibling `waked` binary and wait for its
/// ready line.
pub async fn daemon_start() -> ExitCode {
    let binary = find_waked_binary();
    println!("Starting daemon process...");

    let mut child = match tokio::process::Command::new(&binary)
        .stdout(std::process::Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            eprintln!("Failed to start daemon process ({}).\n   Error: {e}", binary.display());
            return ExitCode::FAILURE;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        return ExitCode::SUCCESS;
    };
    let mut lines = tokio::io::BufReader::new(stdout);
    let mut line = String::new();
    use tokio::io::AsyncBufReadExt;
    match tokio::time::timeout(Duration::from_secs(5), lines.read_line(&mut line)).await {
        Ok(Ok(n)) if n > 0 => {
            print!("{line}");
            ExitCode::SUCCESS
        }
        Ok(_) => {
            eprintln!("Daemon process exited before becoming ready.");
            ExitCode::FAILURE
        }
        Err(_) => {
            println!("Not waiting for the daemon to fully start.");
            ExitCode::SUCCESS
        }
    }
}

fn find_waked_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("waked");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("waked")
}
