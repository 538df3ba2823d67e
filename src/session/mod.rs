//! DUCI session, binding a [`crate::Parser`] to a serial medium.
//!
//! A session owns:
//! - the serial medium, a transport implemented by the application
//!   ([`SerialMedium`], or [`AsyncSerialMedium`] with the `async` feature)
//! - the [`Framer`] used for outgoing lines
//! - the time to wait for replies and received lines
//! - a sticky error status register, accumulating the outcome of every line
//!   serviced until read with `take_error_register()`
//! - the current [`Permission`] level, which command callbacks are checked
//!   against
//!
//! The session is the context passed to command callbacks, so callbacks can
//! reply on the same channel the command arrived on.
//!
//! See [`Session`] for blocking use, typically from an RTOS task, and
//! [`AsyncSession`] for use on an async executor.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;
pub mod sync;

#[cfg(feature = "async")]
pub use futures::{AsyncSerialMedium, AsyncSession};
pub use sync::{SerialMedium, Session};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::frame::{FRAME_OVERHEAD, Framer};
use crate::{DEFAULT_TIMEOUT_MS, Error, ErrorStatus, MESSAGE_MAX_SIZE, Permission};

/// Size of a buffer able to hold any framed outgoing line
pub const LINE_BUFFER_SIZE: usize = MESSAGE_MAX_SIZE + FRAME_OVERHEAD + 1;

/// Size of the buffer lines are received into.  Larger than the longest
/// valid line, so an overlong line is reported as
/// [`ErrorStatus::MESSAGE_TOO_BIG`] rather than truncated.
pub const RX_BUFFER_SIZE: usize = 128;

// State common to the blocking and async sessions
#[derive(Debug)]
struct State {
    framer: Framer,
    timeout_ms: u32,
    error_register: ErrorStatus,
    access_level: Permission,
}

impl State {
    const fn new() -> Self {
        Self {
            framer: Framer::new(true, true),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            error_register: ErrorStatus::empty(),
            access_level: Permission::None,
        }
    }

    fn record(&mut self, status: ErrorStatus) {
        if !status.is_empty() {
            debug!("Recording error status {status:?}");
            self.error_register |= status;
        }
    }

    fn take_error_register(&mut self) -> ErrorStatus {
        core::mem::take(&mut self.error_register)
    }
}

// Status bits to report for a transport error while transmitting
fn tx_status(err: Error) -> ErrorStatus {
    match err {
        Error::BufferTooSmall => ErrorStatus::BUFFER_SIZE,
        Error::Timeout => ErrorStatus::TX_TIMEOUT,
        _ => ErrorStatus::HARDWARE_ERROR,
    }
}

// Status bits to report for a transport error while receiving
fn rx_status(err: Error) -> ErrorStatus {
    match err {
        Error::BufferTooSmall => ErrorStatus::BUFFER_SIZE,
        Error::Timeout => ErrorStatus::RX_TIMEOUT,
        Error::InvalidUtf8 => ErrorStatus::BAD_DATA,
        _ => ErrorStatus::HARDWARE_ERROR,
    }
}

// Interpret received bytes as a line
fn line(buf: &[u8]) -> crate::Result<&str> {
    core::str::from_utf8(buf).map_err(|_| {
        warn!("Received {} bytes of invalid UTF-8", buf.len());
        Error::InvalidUtf8
    })
}
