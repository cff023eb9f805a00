// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Power I/O: serialized access to the digital I/O board.
//!
//! The board exposes two 8-bit ports: sense input (one bit per machine) and
//! drive output (same bits). The underlying driver is not safe for
//! concurrent calls, so every access goes through one mutex. The drive word
//! is shadowed here so that `release` clears exactly the bits its caller
//! pressed, leaving concurrent presses of other machines intact.

use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("cannot open I/O board {device:?}: {source}")]
    Open {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O board read failed: {0}")]
    Read(#[source] io::Error),

    #[error("I/O board write failed: {0}")]
    Write(#[source] io::Error),
}

/// Low-level driver for one dual-port digital I/O device.
///
/// Calls are short and blocking; serialization is the caller's job.
pub trait DioDriver: Send {
    fn read_port(&mut self) -> Result<u8, BoardError>;
    fn write_port(&mut self, bits: u8) -> Result<(), BoardError>;
}

struct BoardInner {
    driver: Box<dyn DioDriver>,
    drive: u8,
}

/// Serialized accessor to the I/O board.
pub struct PowerBoard {
    inner: Mutex<BoardInner>,
}

impl PowerBoard {
    /// Wrap a driver, clearing all drive outputs and probing one read.
    /// Failure here is fatal at daemon startup.
    pub fn new(driver: Box<dyn DioDriver>) -> Result<Self, BoardError> {
        let mut inner = BoardInner { driver, drive: 0 };
        inner.driver.write_port(0)?;
        inner.driver.read_port()?;
        Ok(Self { inner: Mutex::new(inner) })
    }

    /// Read the sense-input word.
    pub fn sample(&self) -> Result<u8, BoardError> {
        self.inner.lock().driver.read_port()
    }

    /// Set the given drive bits and write the word out.
    pub fn press(&self, mask: u8) -> Result<(), BoardError> {
        let mut inner = self.inner.lock();
        inner.drive |= mask;
        let bits = inner.drive;
        inner.driver.write_port(bits)
    }

    /// Clear the given drive bits and write the word out.
    pub fn release(&self, mask: u8) -> Result<(), BoardError> {
        let mut inner = self.inner.lock();
        inner.drive &= !mask;
        let bits = inner.drive;
        inner.driver.write_port(bits)
    }

    /// Currently asserted drive bits.
    pub fn drive_bits(&self) -> u8 {
        self.inner.lock().drive
    }

    /// Clear all outputs; used during daemon cleanup.
    pub fn reset(&self) -> Result<(), BoardError> {
        let mut inner = self.inner.lock();
        inner.drive = 0;
        inner.driver.write_port(0)
    }
}

/// Production driver talking to the board's character device.
///
/// Port layout: sense input at offset 0, drive output at offset 1.
pub struct CharDevDio {
    file: std::fs::File,
    path: PathBuf,
}

impl CharDevDio {
    pub fn open(device: &str) -> Result<Self, BoardError> {
        let path = PathBuf::from(device);
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| BoardError::Open { device: device.to_string(), source })?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(unix)]
impl DioDriver for CharDevDio {
    fn read_port(&mut self) -> Result<u8, BoardError> {
        use std::os::unix::fs::FileExt;
        let mut buf = [0u8; 1];
        self.file.read_at(&mut buf, 0).map_err(BoardError::Read)?;
        Ok(buf[0])
    }

    fn write_port(&mut self, bits: u8) -> Result<(), BoardError> {
        use std::os::unix::fs::FileExt;
        self.file.write_at(&[bits], 1).map_err(BoardError::Write)?;
        Ok(())
    }
}

/// Scriptable driver for tests: sense bits are set from the outside.
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeDio, FakeDioHandle};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{BoardError, DioDriver};

    #[derive(Default)]
    struct FakeState {
        sense: u8,
        drive: u8,
        writes: Vec<u8>,
        fail_reads: bool,
        /// Bits whose sense latches on when their drive bit is pressed,
        /// like a real machine powering up from a button press.
        latch: u8,
    }

    /// Test driver whose sense port is driven by a [`FakeDioHandle`].
    pub struct FakeDio {
        state: Arc<Mutex<FakeState>>,
    }

    /// Shared handle for scripting a [`FakeDio`] from a test.
    #[derive(Clone)]
    pub struct FakeDioHandle {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeDio {
        pub fn new() -> (Self, FakeDioHandle) {
            let state = Arc::new(Mutex::new(FakeState::default()));
            (Self { state: Arc::clone(&state) }, FakeDioHandle { state })
        }
    }

    impl DioDriver for FakeDio {
        fn read_port(&mut self) -> Result<u8, BoardError> {
            let state = self.state.lock();
            if state.fail_reads {
                return Err(BoardError::Read(std::io::Error::other("fake board failure")));
            }
            Ok(state.sense)
        }

        fn write_port(&mut self, bits: u8) -> Result<(), BoardError> {
            let mut state = self.state.lock();
            state.drive = bits;
            state.writes.push(bits);
            state.sense |= bits & state.latch;
            Ok(())
        }
    }

    impl FakeDioHandle {
        /// Set the sense-input word the next reads will observe.
        pub fn set_sense(&self, bits: u8) {
            self.state.lock().sense = bits;
        }

        /// Last written drive word.
        pub fn drive(&self) -> u8 {
            self.state.lock().drive
        }

        /// Every drive word ever written, in order.
        pub fn writes(&self) -> Vec<u8> {
            self.state.lock().writes.clone()
        }

        /// Make subsequent reads fail, to exercise hardware-error paths.
        pub fn fail_reads(&self, fail: bool) {
            self.state.lock().fail_reads = fail;
        }

        /// Make the given sense bits latch on when their drive bit is
        /// pressed, like a machine powering up from the button.
        pub fn latch_on_press(&self, mask: u8) {
            self.state.lock().latch = mask;
        }
    }
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
