//! Blocking session - typically used by RTOS tasks.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::frame::Framer;
use crate::parser::Parser;
use crate::session::{RX_BUFFER_SIZE, State, line, rx_status, tx_status};
use crate::status::AccessControl;
use crate::{Error, ErrorStatus, Permission, Result};

/// Trait for the physical transport of a DUCI channel.
///
/// Blocking version, typically implemented over a UART, USB-CDC or
/// Bluetooth driver.
pub trait SerialMedium {
    /// The medium's transmit buffer.  Outgoing lines are framed directly
    /// into it.
    fn tx_buffer(&mut self) -> &mut [u8];

    /// Transmit the first `len` bytes of the transmit buffer
    fn send(&mut self, len: usize) -> Result<()>;

    /// Transmit the first `len` bytes of the transmit buffer, then wait up
    /// to `timeout_ms` for a reply, copying it into `reply`.
    ///
    /// Returns the length of the reply, or [`Error::Timeout`] if none
    /// arrived.
    fn query(&mut self, len: usize, reply: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Wait up to `timeout_ms` for a received line, copying it into `buf`.
    ///
    /// Returns the length of the line, or [`Error::NoData`] or
    /// [`Error::Timeout`] if nothing arrived.
    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Discard anything received and not yet read
    fn clear_rx_buffer(&mut self);
}

/// Blocking DUCI session over a [`SerialMedium`].
pub struct Session<M: SerialMedium> {
    medium: M,
    state: State,
}

impl<M: SerialMedium> Session<M> {
    /// Create a session owning `medium`, with checksummed CR LF framing and
    /// the default timeout.
    pub const fn new(medium: M) -> Self {
        Self {
            medium,
            state: State::new(),
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    pub fn into_medium(self) -> M {
        self.medium
    }

    pub fn framer(&self) -> Framer {
        self.state.framer
    }

    /// Set the framing for outgoing lines.  [`Session::service()`] resets
    /// this from the parser's configuration.
    pub fn set_framer(&mut self, framer: Framer) {
        self.state.framer = framer;
    }

    pub fn timeout_ms(&self) -> u32 {
        self.state.timeout_ms
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.state.timeout_ms = timeout_ms;
    }

    pub fn set_access_level(&mut self, level: Permission) {
        debug!("Access level {:?} -> {level:?}", self.state.access_level);
        self.state.access_level = level;
    }

    /// Current contents of the error status register
    pub fn error_register(&self) -> ErrorStatus {
        self.state.error_register
    }

    /// Return the error status register, clearing it
    pub fn take_error_register(&mut self) -> ErrorStatus {
        self.state.take_error_register()
    }

    /// Add `status` to the error status register
    pub fn record_error(&mut self, status: ErrorStatus) {
        self.state.record(status);
    }

    /// Frame and transmit `payload`
    pub fn send_string(&mut self, payload: &str) -> Result<()> {
        let len = self.frame(payload)?;
        trace!("Sending {payload:?}");
        self.medium.send(len)
    }

    /// Frame and transmit `payload` from a command callback.
    ///
    /// Returns the status for the callback to return, empty on success.
    pub fn reply(&mut self, payload: &str) -> ErrorStatus {
        match self.send_string(payload) {
            Ok(()) => ErrorStatus::empty(),
            Err(err) => {
                warn!("Failed to send reply {payload:?}: {err:?}");
                tx_status(err)
            }
        }
    }

    /// Frame and transmit `payload`, then wait for a reply, which is read
    /// into `reply`.
    ///
    /// A failure is also recorded in the error status register.
    pub fn query<'b>(&mut self, payload: &str, reply: &'b mut [u8]) -> Result<&'b str> {
        let result = self.frame(payload).and_then(|len| {
            trace!("Querying {payload:?}");
            self.medium.query(len, reply, self.state.timeout_ms)
        });
        let len = result.inspect_err(|&err| self.state.record(rx_status(err)))?;
        line(&reply[..len.min(reply.len())])
            .inspect_err(|&err| self.state.record(rx_status(err)))
    }

    /// Wait for a received line, read into `buf`
    pub fn receive_string<'b>(&mut self, buf: &'b mut [u8]) -> Result<&'b str> {
        let len = self.medium.receive(buf, self.state.timeout_ms)?;
        line(&buf[..len.min(buf.len())])
    }

    pub fn clear_rx_buffer(&mut self) {
        self.medium.clear_rx_buffer();
    }

    /// Receive one line, if any, and parse and dispatch it with `parser`.
    ///
    /// Outgoing lines are framed according to the parser's configuration.
    /// The resulting status is added to the error status register and
    /// returned.  Returns `None` if no line arrived within the timeout.
    pub fn service<const N: usize>(
        &mut self,
        parser: &mut Parser<Self, N>,
    ) -> Result<Option<ErrorStatus>> {
        self.state.framer = parser.config().framer();

        let mut buf = [0u8; RX_BUFFER_SIZE];
        let len = match self.medium.receive(&mut buf, self.state.timeout_ms) {
            Ok(len) => len.min(buf.len()),
            Err(Error::NoData | Error::Timeout) => return Ok(None),
            Err(err) => {
                self.state.record(rx_status(err));
                return Err(err);
            }
        };

        let line = line(&buf[..len]).inspect_err(|&err| self.state.record(rx_status(err)))?;
        let status = parser.parse(self, line);
        self.state.record(status);
        Ok(Some(status))
    }

    fn frame(&mut self, payload: &str) -> Result<usize> {
        let framer = self.state.framer;
        framer.frame(payload, self.medium.tx_buffer())
    }
}

impl<M: SerialMedium> AccessControl for Session<M> {
    fn access_level(&self) -> Permission {
        self.state.access_level
    }
}
