// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame-level codec: self-delimited messages over a byte stream.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Message-type tags. The numeric values are the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// Synthetic: the peer closed the stream. Never transmitted.
    Eof,
    /// Daemon → operator: human-readable log line.
    Log,
    /// Operator ↔ daemon: command request / structured status reply.
    User,
    /// Daemon ↔ agent: Got alive, shutdown, command, restart.
    Computer,
    /// Locally injected by the ping scheduler; never crosses the wire.
    PingSchedule,
    /// Liveness probe carrying the sender's monotonic timestamp.
    PingRequest,
    /// Echo of a probe, payload unchanged.
    PingAnswer,
}

impl MsgType {
    pub fn tag(self) -> u32 {
        match self {
            MsgType::Eof => 0,
            MsgType::Log => 1,
            MsgType::User => 2,
            MsgType::Computer => 3,
            MsgType::PingSchedule => 4,
            MsgType::PingRequest => 5,
            MsgType::PingAnswer => 6,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(MsgType::Eof),
            1 => Some(MsgType::Log),
            2 => Some(MsgType::User),
            3 => Some(MsgType::Computer),
            4 => Some(MsgType::PingSchedule),
            5 => Some(MsgType::PingRequest),
            6 => Some(MsgType::PingAnswer),
            _ => None,
        }
    }
}

/// A received frame: type tag plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg: MsgType,
    pub payload: Vec<u8>,
}

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum WireError {
    /// The stream ended inside a frame header or body.
    #[error("connection closed mid-frame")]
    Truncated,

    /// Tag not in the message registry. The stream is still in sync:
    /// the payload has been consumed, so the caller may keep reading.
    #[error("unknown message type {0}")]
    UnknownType(u32),

    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("ping payload must be 8 bytes, got {0}")]
    BadPing(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read one frame.
///
/// Returns `Ok(None)` on a graceful EOF: zero bytes available at the first
/// byte of the type field. EOF at any later point is [`WireError::Truncated`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 8];
    let n = reader.read(&mut header[..1]).await?;
    if n == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..]).await.map_err(eof_is_truncation)?;

    let tag = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(eof_is_truncation)?;

    match MsgType::from_tag(tag) {
        Some(msg) => Ok(Some(Frame { msg, payload })),
        None => Err(WireError::UnknownType(tag)),
    }
}

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, msg: MsgType, payload: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&msg.tag().to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

fn eof_is_truncation(e: std::io::Error) -> WireError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        WireError::Truncated
    } else {
        WireError::Io(e)
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
