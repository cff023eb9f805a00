// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ping payloads: the sender's monotonic milliseconds, echoed verbatim.

use crate::frame::WireError;

pub fn encode_ping(ms: u64) -> [u8; 8] {
    ms.to_be_bytes()
}

pub fn decode_ping(payload: &[u8]) -> Result<u64, WireError> {
    let bytes: [u8; 8] =
        payload.try_into().map_err(|_| WireError::BadPing(payload.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
#[path = "ping_tests.rs"]
mod tests;
