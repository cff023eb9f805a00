// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle scenarios: wire-initiated shutdown with log forwarding,
//! restart scheduling, the port-file single-instance guard.

use super::prelude::*;

#[tokio::test]
async fn daemon_stop_forwards_cleanup_output_to_the_operator() {
    let dir = tempfile::tempdir().unwrap();
    let port_file = dir.path().join("waked.port");
    let td = spawn_daemon_with(Config {
        port: 0,
        port_file: Some(port_file.clone()),
        log_dir: std::env::temp_dir(),
        device: "fake".to_string(),
    })
    .await;
    assert!(port_file.exists());

    // the operator connection stays open to receive the cleanup log
    let operator = tokio::spawn(operator_request(td.port, &["daemon", "stop"]));

    td.task.await.unwrap(); // accept loop exits on the scheduled stop
    cleanup(&td.daemon).await;

    let frames = operator.await.unwrap();
    assert!(
        log_lines(&frames).iter().any(|l| l == "Done."),
        "cleanup output not forwarded: {frames:?}"
    );
    assert!(!port_file.exists(), "port file must be removed during cleanup");
    assert!(!td.daemon.restart.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn daemon_restart_schedules_a_respawn() {
    let td = spawn_daemon().await;

    let operator = tokio::spawn(operator_request(td.port, &["daemon", "restart"]));
    td.task.await.unwrap();

    assert!(td.daemon.restart.load(std::sync::atomic::Ordering::SeqCst));
    assert!(td.daemon.shutdown_log.lock().is_some());
    // cleanup() would respawn the current executable, which in this test
    // process would be the test binary itself; scheduling is enough here.
    operator.abort();
}

#[tokio::test]
async fn port_file_guards_against_a_second_instance() {
    let dir = tempfile::tempdir().unwrap();
    let port_file = dir.path().join("waked.port");
    std::fs::write(&port_file, "9978").unwrap();

    let (dio, _handle) = FakeDio::new();
    let config = Config {
        port: 0,
        port_file: Some(port_file.clone()),
        log_dir: std::env::temp_dir(),
        device: "fake".to_string(),
    };
    let err = match startup(config, test_registry(), Box::new(dio)).await {
        Ok(_) => panic!("expected startup to fail because the port file is already claimed"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("already running"));
    assert!(port_file.exists());
}

#[tokio::test]
async fn daemon_survives_an_abruptly_closed_connection() {
    let td = spawn_daemon().await;

    // half a frame header, then gone
    {
        use tokio::io::AsyncWriteExt;
        let mut stream =
            tokio::net::TcpStream::connect(("127.0.0.1", td.port)).await.unwrap();
        stream.write_all(&[0, 0, 0]).await.unwrap();
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(td.status_token("c2").await, "OFF");
}
