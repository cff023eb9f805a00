// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Power-management scenarios: button presses, agent attach, shutdown,
//! boot chains, liveness.

use super::prelude::*;

#[tokio::test]
async fn start_presses_the_button_and_reports_starting() {
    let td = spawn_daemon().await;
    td.dio.latch_on_press(C2_MASK); // pressing the button powers the machine

    let frames = td.operator(&["start", "c2"]).await;

    // drive word: cleared at init, asserted for the press, released
    assert_eq!(td.dio.writes(), vec![0x00, C2_MASK, 0x00]);
    assert_eq!(td.machine_status("c2"), Status::Starting);
    assert_eq!(td.status_token("c2").await, "STARTING");
    assert!(
        log_lines(&frames).iter().any(|l| l.contains("successfully started")),
        "got: {frames:?}"
    );
}

#[tokio::test]
async fn failed_start_reports_and_stays_off() {
    let td = spawn_daemon().await;
    // no latch: the machine never powers up

    let frames = td.operator(&["start", "c2"]).await;

    assert_eq!(td.dio.writes(), vec![0x00, C2_MASK, 0x00]);
    assert_eq!(td.machine_status("c2"), Status::Off);
    assert!(log_lines(&frames).iter().any(|l| l.contains("Failed to start")));
}

#[tokio::test]
async fn got_alive_moves_a_starting_machine_to_on() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);
    let _ = td.operator(&["status", "c2"]).await; // sample: OFF → STARTING
    assert_eq!(td.machine_status("c2"), Status::Starting);

    let agent = td.connect_agent("c2", "linux", "/dev/sda5").await;
    td.wait_for_status("c2", Status::On, 1_000).await;

    {
        let fleet = td.daemon.fleet.lock();
        let id = fleet.registry().find("c2").unwrap();
        let os = fleet.state(id).current_os.expect("current OS set while ON");
        assert_eq!(fleet.machine(id).os(os).name, "linux");
    }
    assert_eq!(td.status_token("c2").await, "ON");
    agent.abandon();
}

#[tokio::test]
async fn stop_sends_shutdown_then_freezes_then_powers_off() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);
    let mut agent = td.connect_agent("c2", "linux", "/dev/sda5").await;
    td.wait_for_status("c2", Status::On, 1_000).await;

    let _ = td.operator(&["stop", "c2"]).await;
    assert_eq!(agent.next_daemon_msg().await, DaemonMsg::Shutdown);
    assert_eq!(td.machine_status("c2"), Status::Stopping);

    // agent dies while power is still sensed
    agent.abandon();
    td.wait_for_status("c2", Status::Frozen, 1_000).await;

    // power drops; the next sample reports OFF
    td.dio.set_sense(0x00);
    assert_eq!(td.status_token("c2").await, "OFF");
}

#[tokio::test]
async fn start_with_other_os_while_on_issues_the_boot_chain() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);
    // agent reports the boot-manager partition
    let mut agent = td.connect_agent("c2", "linux", "/dev/sda7").await;
    td.wait_for_status("c2", Status::On, 1_000).await;

    let _ = td.operator(&["start", "c2", "linux"]).await;

    assert_eq!(
        agent.next_daemon_msg().await,
        DaemonMsg::Command { argv: vec!["/opt/wake/reboot_to_linux.sh".to_string()] }
    );
    assert_eq!(agent.next_daemon_msg().await, DaemonMsg::Restart);
    assert_eq!(td.machine_status("c2"), Status::Starting);
    agent.abandon();
}

#[tokio::test]
async fn unanswered_ping_freezes_the_machine() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);
    let agent = td.connect_agent("c2", "linux", "/dev/sda5").await;
    td.wait_for_status("c2", Status::On, 1_000).await;

    // Drive the scheduler's part by hand: two ping rounds the agent never
    // answers. The first sends a request, the second finds it unanswered.
    let conn = {
        let fleet = td.daemon.fleet.lock();
        let id = fleet.registry().find("c2").unwrap();
        fleet.state(id).conn.unwrap()
    };
    for now in [1_000, 2_000] {
        let links = td.daemon.links.lock();
        let link = links.get(&conn).expect("agent link present");
        link.ctrl_tx
            .send(wake_daemon::listener::ControlEvent::PingSchedule(now))
            .unwrap();
        drop(links);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    td.wait_for_status("c2", Status::Frozen, 2_000).await;
    agent.abandon();
}

#[tokio::test]
async fn kill_releases_the_button_and_reports_off() {
    let td = spawn_daemon().await;
    td.dio.set_sense(C2_MASK);
    let _ = td.operator(&["status", "c2"]).await; // STARTING

    // power drops shortly after the button is pressed
    let dio = td.dio.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        dio.set_sense(0x00);
    });
    let frames = td.operator(&["kill", "c2"]).await;

    assert_eq!(td.machine_status("c2"), Status::Off);
    assert_eq!(td.daemon.board.drive_bits(), 0);
    assert!(log_lines(&frames).iter().any(|l| l.contains("successfully powered off")));
}

#[tokio::test]
async fn concurrent_status_queries_see_consistent_snapshots() {
    let td = spawn_daemon().await;
    td.dio.latch_on_press(C2_MASK);

    let (a, b) = tokio::join!(
        operator_request(td.port, &["status", "--machine-readable", "c2", "p4"]),
        operator_request(td.port, &["status", "--machine-readable", "c2", "p4"]),
    );
    for frames in [&a, &b] {
        let tokens: Vec<String> = frames
            .iter()
            .filter(|f| f.msg == MsgType::User)
            .map(|f| String::from_utf8(f.payload.clone()).unwrap())
            .collect();
        assert_eq!(tokens.len(), 2);
        for token in &tokens {
            assert!(Status::from_name(token).is_some(), "bad token {token:?}");
        }
    }

    // a start in between never leaves the drive bit asserted once it returns
    let _ = td.operator(&["start", "c2"]).await;
    assert_eq!(td.daemon.board.drive_bits() & C2_MASK, 0);
}

#[tokio::test]
async fn unwired_machine_is_driven_by_connection_presence() {
    let td = spawn_daemon().await;

    let agent = td.connect_agent("p4", "linux", "").await;
    td.wait_for_status("p4", Status::On, 1_000).await;

    agent.abandon();
    td.wait_for_status("p4", Status::Off, 1_000).await;
}
