// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task and per-connection handlers.
//!
//! One listening socket accepts both operator CLIs and machine agents; a
//! connection is classified by its first frame (USER means operator, a
//! COMPUTER `Got alive` means agent). Each handler owns its socket: reads
//! happen in the handler task, writes go through a mailbox drained by a
//! writer task, and other components reach the connection only through its
//! [`Link`].

mod agent;
mod operator;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wake_core::{ConnId, MachineId};
use wake_wire::{decode_ping, encode_ping, read_frame, write_frame, AgentMsg, Frame, MsgType, WireError};

use crate::lifecycle::Daemon;
use crate::logfan::{LogSink, TeeSink};

/// One outbound frame queued for a connection's writer task.
#[derive(Debug, Clone)]
pub struct OutFrame {
    pub msg: MsgType,
    pub payload: Vec<u8>,
}

/// Events injected into a handler's inbound stream by other tasks.
#[derive(Debug, Clone, Copy)]
pub enum ControlEvent {
    /// Sent by the ping scheduler; carries the timestamp to transmit.
    PingSchedule(u64),
}

/// Handle to a live connection, held in the daemon's link table.
pub struct Link {
    pub out_tx: mpsc::UnboundedSender<OutFrame>,
    pub ctrl_tx: mpsc::UnboundedSender<ControlEvent>,
    pub cancel: CancellationToken,
}

/// Peer classification, decided by the first frame received.
enum Peer {
    Unclassified,
    Operator,
    Agent(MachineId),
}

/// Handle one accepted socket until EOF, error, cancellation or ping timeout.
pub async fn handle_connection(stream: TcpStream, daemon: Arc<Daemon>) {
    let conn = daemon.next_conn_id();
    if let Err(e) = set_keepalive(&stream) {
        warn!("{conn}: cannot set TCP keep-alive: {e}");
    }

    let (mut reader, mut writer) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutFrame>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<ControlEvent>();
    let cancel = CancellationToken::new();
    daemon.links.lock().insert(
        conn,
        Link { out_tx: out_tx.clone(), ctrl_tx, cancel: cancel.clone() },
    );

    // The writer task owns the write half; it drains the mailbox until every
    // sender (handler, link table, shutdown log) is gone, then half-closes.
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if write_frame(&mut writer, frame.msg, &frame.payload).await.is_err() {
                break;
            }
        }
        use tokio::io::AsyncWriteExt;
        let _ = writer.shutdown().await;
    });

    let tee = TeeSink::new(out_tx.clone());
    tee.debug("Connection handler started.");

    let mut peer = Peer::Unclassified;
    'conn: loop {
        let read = read_frame(&mut reader);
        tokio::pin!(read);
        // Poll control events without dropping an in-flight partial read.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'conn,
                ev = ctrl_rx.recv() => {
                    let Some(ControlEvent::PingSchedule(now)) = ev else { break 'conn };
                    if !handle_ping_schedule(&daemon, conn, &peer, now, &tee) {
                        break 'conn;
                    }
                }
                frame = &mut read => {
                    match frame {
                        Ok(Some(f)) => {
                            if !handle_frame(&daemon, conn, &mut peer, f, &tee).await {
                                break 'conn;
                            }
                        }
                        Ok(None) => break 'conn, // graceful EOF
                        Err(WireError::UnknownType(tag)) => {
                            tee.error(&format!("Unknown message type: {tag}."));
                        }
                        Err(e) => {
                            log_connection_error(&peer, &e);
                            break 'conn;
                        }
                    }
                    break; // re-arm the read future
                }
            }
        }
    }

    teardown(&daemon, conn, &peer, &tee);
}

/// Dispatch one inbound frame. Returns false to close the connection.
async fn handle_frame(
    daemon: &Arc<Daemon>,
    conn: ConnId,
    peer: &mut Peer,
    frame: Frame,
    tee: &TeeSink,
) -> bool {
    match frame.msg {
        MsgType::User => {
            if matches!(peer, Peer::Agent(_)) {
                tee.error("Unexpected user message on an agent connection.");
                return true;
            }
            *peer = Peer::Operator;
            operator::handle_user(daemon, conn, &frame.payload, tee).await;
            true
        }

        MsgType::Computer => match AgentMsg::decode(&frame.payload) {
            Ok(AgentMsg::GotAlive { machine, platform, partition }) => {
                match agent::handle_got_alive(daemon, conn, &machine, &platform, &partition, tee)
                    .await
                {
                    Some(id) => {
                        *peer = Peer::Agent(id);
                        true
                    }
                    None => false,
                }
            }
            Err(e) => {
                tee.error(&format!("Unknown computer message: {e}."));
                true
            }
        },

        MsgType::PingRequest => {
            // echo the payload unchanged
            send(daemon, conn, MsgType::PingAnswer, frame.payload);
            true
        }

        MsgType::PingAnswer => {
            if let Peer::Agent(id) = peer {
                match decode_ping(&frame.payload) {
                    Ok(ms) => {
                        let mut fleet = daemon.fleet.lock();
                        let st = fleet.state_mut(*id);
                        if st.conn == Some(conn) {
                            st.last_ping_acked = Some(ms);
                        }
                    }
                    Err(e) => tee.error(&format!("Bad ping answer: {e}.")),
                }
            }
            true
        }

        MsgType::Log | MsgType::Eof | MsgType::PingSchedule => {
            tee.error(&format!("Unexpected message type {} on the wire.", frame.msg.tag()));
            true
        }
    }
}

/// Ping-schedule bookkeeping for an attached agent connection.
/// Returns false when the previous ping was never answered.
fn handle_ping_schedule(
    daemon: &Arc<Daemon>,
    conn: ConnId,
    peer: &Peer,
    now: u64,
    _tee: &TeeSink,
) -> bool {
    let Peer::Agent(id) = peer else { return true };
    {
        let mut fleet = daemon.fleet.lock();
        let name = fleet.machine(*id).name.clone();
        let st = fleet.state_mut(*id);
        if st.conn != Some(conn) {
            return true;
        }
        if st.ping_overdue() {
            error!("{name}: connection lost (ping timeout).");
            return false;
        }
        st.last_ping_sent = Some(now);
    }
    send(daemon, conn, MsgType::PingRequest, encode_ping(now).to_vec());
    true
}

/// Detach and re-evaluate any machine this connection served, then remove
/// the link. Runs on every exit path.
fn teardown(daemon: &Arc<Daemon>, conn: ConnId, peer: &Peer, tee: &TeeSink) {
    tee.debug("Connection handler cleaning up...");
    daemon.links.lock().remove(&conn);

    if let Peer::Agent(id) = peer {
        // Freezing is the safe call if the board cannot be read here.
        let bits = match daemon.board.sample() {
            Ok(bits) => bits,
            Err(e) => {
                error!("hardware error while detaching: {e}");
                0xff
            }
        };
        let (applied, name) = {
            let mut fleet = daemon.fleet.lock();
            let name = fleet.machine(*id).name.clone();
            (fleet.agent_disconnect(*id, conn, bits), name)
        };
        if applied {
            info!("Computer {name} disconnected.");
        }
    }
    tee.debug("Connection handler terminated.");
}

/// Queue a frame on a connection's mailbox.
fn send(daemon: &Daemon, conn: ConnId, msg: MsgType, payload: Vec<u8>) {
    let links = daemon.links.lock();
    if let Some(link) = links.get(&conn) {
        let _ = link.out_tx.send(OutFrame { msg, payload });
    }
}

fn log_connection_error(peer: &Peer, e: &WireError) {
    match e {
        // peer resets are routine, especially for rebooting agents
        WireError::Io(io) if io.kind() == std::io::ErrorKind::ConnectionReset => {
            debug!("Connection reset.");
        }
        _ if matches!(peer, Peer::Operator) => debug!("Operator connection error: {e}"),
        _ => error!("Connection error: {e}"),
    }
}

/// TCP keep-alive per the liveness protocol: 6 s idle, 1 s interval,
/// 4 probes, so dead peers surface within ~10 s at the transport layer.
fn set_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(6))
        .with_interval(Duration::from_secs(1))
        .with_retries(4);
    socket2::SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
