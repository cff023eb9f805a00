// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol behavior: error reporting over the LOG channel, connection
//! survival, classification.

use super::prelude::*;

#[tokio::test]
async fn unknown_verb_is_reported_and_harmless() {
    let td = spawn_daemon().await;
    let frames = td.operator(&["frobnicate"]).await;
    assert!(
        log_lines(&frames).iter().any(|l| l.contains("unknown command: frobnicate")),
        "got: {frames:?}"
    );
    // the daemon is still serving
    assert_eq!(td.status_token("c2").await, "OFF");
}

#[tokio::test]
async fn unknown_machine_is_reported() {
    let td = spawn_daemon().await;
    let frames = td.operator(&["start", "ghost"]).await;
    assert!(log_lines(&frames).iter().any(|l| l.contains("ghost is not a configured computer.")));
}

#[tokio::test]
async fn missing_machine_argument_is_reported() {
    let td = spawn_daemon().await;
    let frames = td.operator(&["stop"]).await;
    assert!(log_lines(&frames).iter().any(|l| l.contains("no machine specified")));
}

#[tokio::test]
async fn command_against_a_machine_that_is_not_on_is_refused() {
    let td = spawn_daemon().await;
    let frames = td.operator(&["command", "c2", "uname", "-a"]).await;
    assert!(log_lines(&frames).iter().any(|l| l.contains("not in ON state")));
}

#[tokio::test]
async fn command_is_forwarded_to_an_on_machine() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);
    let mut agent = td.connect_agent("c2", "linux", "/dev/sda5").await;
    td.wait_for_status("c2", Status::On, 1_000).await;

    let _ = td.operator(&["command", "c2", "uname", "-a"]).await;
    assert_eq!(
        agent.next_daemon_msg().await,
        DaemonMsg::Command { argv: vec!["uname".to_string(), "-a".to_string()] }
    );
    agent.abandon();
}

#[tokio::test]
async fn list_is_not_implemented_yet() {
    let td = spawn_daemon().await;
    let frames = td.operator(&["list"]).await;
    assert!(log_lines(&frames).iter().any(|l| l.contains("not implemented yet")));
}

#[tokio::test]
async fn unregistered_agent_is_turned_away() {
    let td = spawn_daemon().await;
    let stream = tokio::net::TcpStream::connect(("127.0.0.1", td.port)).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    let hello = AgentMsg::GotAlive {
        machine: "intruder".to_string(),
        platform: "linux".to_string(),
        partition: String::new(),
    };
    write_frame(&mut writer, MsgType::Computer, &hello.encode()).await.unwrap();

    // the daemon explains itself, then closes
    let mut saw_complaint = false;
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) if frame.msg == MsgType::Log => {
                let line = String::from_utf8_lossy(&frame.payload).into_owned();
                if line.contains("not a registered computer") {
                    saw_complaint = true;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    assert!(saw_complaint);
}

#[tokio::test]
async fn status_tokens_are_always_from_the_fixed_set() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);

    for _ in 0..3 {
        let frames = td.operator(&["status", "--machine-readable"]).await;
        for frame in frames.iter().filter(|f| f.msg == MsgType::User) {
            let token = String::from_utf8(frame.payload.clone()).unwrap();
            assert!(Status::from_name(&token).is_some(), "bad token {token:?}");
        }
    }
}

#[tokio::test]
async fn human_status_includes_the_running_os() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);
    let agent = td.connect_agent("c2", "linux", "/dev/sda5").await;
    td.wait_for_status("c2", Status::On, 1_000).await;

    let frames = td.operator(&["status", "c2"]).await;
    let lines = log_lines(&frames);
    assert!(lines.iter().any(|l| l.contains("Computer c2:")));
    assert!(lines.iter().any(|l| l.contains("Status: ON")));
    assert!(lines.iter().any(|l| l.contains("OS:") && l.contains("linux")));
    agent.abandon();
}
