// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures: an in-process daemon on a loopback port with a fake
//! I/O board, plus operator and agent connection helpers.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub use wake_core::test_support::{bare_machine, dual_boot_machine};
pub use wake_core::{Registry, Status};
pub use wake_daemon::board::{FakeDio, FakeDioHandle};
pub use wake_daemon::{cleanup, run, startup, Config, Daemon, StartupResult};
pub use wake_wire::{
    encode_user, read_frame, write_frame, AgentMsg, DaemonMsg, Frame, MsgType, UserRequest,
};

pub const C2_MASK: u8 = 0x02;

/// A daemon running in this process: fake board handle, live port, and the
/// accept-loop task.
pub struct TestDaemon {
    pub dio: FakeDioHandle,
    pub port: u16,
    pub daemon: Arc<Daemon>,
    pub task: JoinHandle<()>,
}

pub fn test_registry() -> Registry {
    Registry::new(vec![dual_boot_machine("c2", C2_MASK), bare_machine("p4", 0)]).unwrap()
}

pub async fn spawn_daemon() -> TestDaemon {
    spawn_daemon_with(Config {
        port: 0,
        port_file: None,
        log_dir: std::env::temp_dir(),
        device: "fake".to_string(),
    })
    .await
}

pub async fn spawn_daemon_with(config: Config) -> TestDaemon {
    let (dio_driver, dio) = FakeDio::new();
    let StartupResult { daemon, listener, port } =
        startup(config, test_registry(), Box::new(dio_driver)).await.unwrap();
    let task = tokio::spawn(run(Arc::clone(&daemon), listener));
    TestDaemon { dio, port, daemon, task }
}

impl TestDaemon {
    /// Issue one operator command and collect every reply frame until EOF.
    pub async fn operator(&self, argv: &[&str]) -> Vec<Frame> {
        operator_request(self.port, argv).await
    }

    /// Machine-readable status of one machine: the bare state token.
    pub async fn status_token(&self, name: &str) -> String {
        let frames = self.operator(&["status", "--machine-readable", name]).await;
        let users: Vec<&Frame> = frames.iter().filter(|f| f.msg == MsgType::User).collect();
        assert_eq!(users.len(), 1, "expected exactly one status token, got {frames:?}");
        String::from_utf8(users[0].payload.clone()).unwrap()
    }

    /// Connect an agent and announce it; the daemon's reply stream stays open.
    pub async fn connect_agent(&self, name: &str, platform: &str, partition: &str) -> AgentConn {
        let stream = TcpStream::connect(("127.0.0.1", self.port)).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let hello = AgentMsg::GotAlive {
            machine: name.to_string(),
            platform: platform.to_string(),
            partition: partition.to_string(),
        };
        write_frame(&mut writer, MsgType::Computer, &hello.encode()).await.unwrap();
        AgentConn { reader, writer }
    }

    pub fn machine_status(&self, name: &str) -> Status {
        let fleet = self.daemon.fleet.lock();
        let id = fleet.registry().find(name).unwrap();
        fleet.state(id).status
    }

    /// Wait (bounded) until the machine reaches the wanted state.
    pub async fn wait_for_status(&self, name: &str, wanted: Status, max_ms: u64) {
        let mut waited = 0;
        loop {
            if self.machine_status(name) == wanted {
                return;
            }
            assert!(waited < max_ms, "{name} never reached {wanted}");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            waited += 20;
        }
    }
}

/// One request/stream exchange on a fresh operator connection.
pub async fn operator_request(port: u16, argv: &[&str]) -> Vec<Frame> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    let request = UserRequest { argv: argv.iter().map(|s| s.to_string()).collect() };
    write_frame(&mut writer, MsgType::User, &encode_user(&request)).await.unwrap();
    writer.shutdown().await.unwrap();

    let mut frames = Vec::new();
    while let Ok(Some(frame)) = read_frame(&mut reader).await {
        frames.push(frame);
    }
    frames
}

/// An attached agent connection, reads driven by the test.
pub struct AgentConn {
    pub reader: tokio::net::tcp::OwnedReadHalf,
    pub writer: tokio::net::tcp::OwnedWriteHalf,
}

impl AgentConn {
    /// Next COMPUTER frame, decoded; LOG frames on the way are skipped.
    pub async fn next_daemon_msg(&mut self) -> DaemonMsg {
        loop {
            let frame = tokio::time::timeout(
                std::time::Duration::from_secs(2),
                read_frame(&mut self.reader),
            )
            .await
            .expect("timed out waiting for a daemon message")
            .unwrap()
            .expect("daemon closed the agent connection");
            match frame.msg {
                MsgType::Computer => return DaemonMsg::decode(&frame.payload).unwrap(),
                MsgType::Log => continue,
                MsgType::PingRequest => {
                    // keep liveness going while waiting
                    write_frame(&mut self.writer, MsgType::PingAnswer, &frame.payload)
                        .await
                        .unwrap();
                }
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    /// Drop the connection without any protocol goodbye.
    pub fn abandon(self) {}
}

/// Frames of LOG type, as text.
pub fn log_lines(frames: &[Frame]) -> Vec<String> {
    frames
        .iter()
        .filter(|f| f.msg == MsgType::Log)
        .map(|f| String::from_utf8_lossy(&f.payload).into_owned())
        .collect()
}
