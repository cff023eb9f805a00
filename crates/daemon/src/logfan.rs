// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log fan-out.
//!
//! Connection handlers log through a [`TeeSink`] that duplicates each record
//! into the global tracing subscriber and a LOG frame to the remote peer.
//! `daemon stop`/`daemon restart` promote their connection's sink to the
//! process-wide shutdown log so cleanup output reaches the operator that
//! asked for it.

use tokio::sync::mpsc;

use wake_wire::MsgType;

use crate::listener::OutFrame;

/// Record levels carried through a sink.
///
/// `Critical` is operator-facing output that must always be shown; it maps
/// to `error` in the file log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Error,
    Critical,
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
    fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }
}

/// The global tracing subscriber (rotating file, optional stdout).
pub struct FileSink;

impl LogSink for FileSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Error | LogLevel::Critical => tracing::error!("{message}"),
        }
    }
}

/// Sends records to one connection as LOG frames.
///
/// Debug records stay local; everything else crosses the wire. Send failures
/// are ignored: a vanished peer is handled by its connection handler.
#[derive(Clone)]
pub struct ConnSink {
    tx: mpsc::UnboundedSender<OutFrame>,
}

impl ConnSink {
    pub fn new(tx: mpsc::UnboundedSender<OutFrame>) -> Self {
        Self { tx }
    }
}

impl LogSink for ConnSink {
    fn log(&self, level: LogLevel, message: &str) {
        if level == LogLevel::Debug {
            return;
        }
        let _ = self.tx.send(OutFrame { msg: MsgType::Log, payload: message.as_bytes().to_vec() });
    }
}

/// Duplicates records into the file log and a connection.
pub struct TeeSink {
    conn: ConnSink,
}

impl TeeSink {
    pub fn new(tx: mpsc::UnboundedSender<OutFrame>) -> Self {
        Self { conn: ConnSink::new(tx) }
    }

    pub fn from_sink(conn: ConnSink) -> Self {
        Self { conn }
    }

    /// The connection half, for promotion to the shutdown log.
    pub fn conn_sink(&self) -> ConnSink {
        self.conn.clone()
    }
}

impl LogSink for TeeSink {
    fn log(&self, level: LogLevel, message: &str) {
        FileSink.log(level, message);
        self.conn.log(level, message);
    }
}

#[cfg(test)]
#[path = "logfan_tests.rs"]
mod tests;
