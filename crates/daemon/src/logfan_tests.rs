// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sink_pair() -> (ConnSink, tokio::sync::mpsc::UnboundedReceiver<OutFrame>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (ConnSink::new(tx), rx)
}

#[test]
fn conn_sink_sends_log_frames() {
    let (sink, mut rx) = sink_pair();
    sink.info("Computer c2 successfully started.");

    let frame = rx.try_recv().unwrap();
    assert_eq!(frame.msg, MsgType::Log);
    assert_eq!(frame.payload, b"Computer c2 successfully started.");
}

#[test]
fn conn_sink_keeps_debug_local() {
    let (sink, mut rx) = sink_pair();
    sink.debug("Connection handler started.");
    assert!(rx.try_recv().is_err());

    sink.critical("boom");
    assert_eq!(rx.try_recv().unwrap().payload, b"boom");
}

#[test]
fn conn_sink_ignores_a_closed_peer() {
    let (sink, rx) = sink_pair();
    drop(rx);
    // must not panic or error
    sink.error("peer is gone");
}

#[test]
fn tee_sink_forwards_to_the_connection() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let tee = TeeSink::new(tx);
    tee.error("Error: no machine specified.");

    let frame = rx.try_recv().unwrap();
    assert_eq!(frame.msg, MsgType::Log);
    assert_eq!(frame.payload, b"Error: no machine specified.");
}

#[test]
fn tee_sink_conn_half_is_promotable() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let tee = TeeSink::new(tx);
    let promoted = tee.conn_sink();
    drop(tee);

    promoted.info("Done.");
    assert_eq!(rx.try_recv().unwrap().payload, b"Done.");
}
