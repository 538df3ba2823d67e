//! Asynchronous session - for channels serviced on an async executor.
//!
//! Command callbacks are synchronous, so cannot transmit on an async medium
//! themselves.  Instead [`AsyncSession::reply()`] frames and queues the
//! reply, and [`AsyncSession::service()`] transmits everything queued once
//! the line has been dispatched.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use alloc::boxed::Box;
use async_trait::async_trait;
use heapless::{Deque, Vec};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::frame::Framer;
use crate::parser::Parser;
use crate::session::{LINE_BUFFER_SIZE, RX_BUFFER_SIZE, State, line, rx_status, tx_status};
use crate::status::AccessControl;
use crate::{Error, ErrorStatus, Permission, Result};

/// Maximum number of replies a single command can queue
pub const MAX_PENDING_REPLIES: usize = 4;

type Line = Vec<u8, LINE_BUFFER_SIZE>;

/// Trait for the physical transport of a DUCI channel.
///
/// Async version, typically implemented over an async UART or USB driver.
#[async_trait(?Send)]
pub trait AsyncSerialMedium {
    /// Transmit a framed line
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Transmit a framed line, then wait up to `timeout_ms` for a reply,
    /// copying it into `reply`.
    ///
    /// Returns the length of the reply, or [`Error::Timeout`] if none
    /// arrived.
    async fn query(&mut self, data: &[u8], reply: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Wait up to `timeout_ms` for a received line, copying it into `buf`.
    ///
    /// Returns the length of the line, or [`Error::NoData`] or
    /// [`Error::Timeout`] if nothing arrived.
    async fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Discard anything received and not yet read
    async fn clear_rx_buffer(&mut self);
}

/// Asynchronous DUCI session over an [`AsyncSerialMedium`].
///
/// Configuration and the error status register behave as for
/// [`crate::session::Session`].
pub struct AsyncSession<M: AsyncSerialMedium> {
    medium: M,
    state: State,
    pending: Deque<Line, MAX_PENDING_REPLIES>,
}

impl<M: AsyncSerialMedium> AsyncSession<M> {
    pub const fn new(medium: M) -> Self {
        Self {
            medium,
            state: State::new(),
            pending: Deque::new(),
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    pub fn framer(&self) -> Framer {
        self.state.framer
    }

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

    pub fn error_register(&self) -> ErrorStatus {
        self.state.error_register
    }

    pub fn take_error_register(&mut self) -> ErrorStatus {
        self.state.take_error_register()
    }

    pub fn record_error(&mut self, status: ErrorStatus) {
        self.state.record(status);
    }

    /// Number of replies queued and not yet transmitted
    pub fn pending_replies(&self) -> usize {
        self.pending.len()
    }

    /// Frame and transmit `payload`
    pub async fn send_string(&mut self, payload: &str) -> Result<()> {
        let line = self.frame(payload)?;
        trace!("Sending {payload:?}");
        self.medium.send(&line).await
    }

    /// Frame `payload` and queue it for transmission by
    /// [`AsyncSession::service()`] or [`AsyncSession::flush()`].
    ///
    /// For use from command callbacks.  Returns the status for the callback
    /// to return, empty on success.
    pub fn reply(&mut self, payload: &str) -> ErrorStatus {
        let line = match self.frame(payload) {
            Ok(line) => line,
            Err(err) => return tx_status(err),
        };
        match self.pending.push_back(line) {
            Ok(()) => ErrorStatus::empty(),
            Err(_) => {
                warn!("Reply queue full, dropping {payload:?}");
                ErrorStatus::BUFFER_SIZE
            }
        }
    }

    /// Transmit all queued replies.
    ///
    /// Stops at the first failure, which is also recorded in the error
    /// status register.  Replies after the failed one remain queued.
    pub async fn flush(&mut self) -> Result<()> {
        while let Some(line) = self.pending.pop_front() {
            if let Err(err) = self.medium.send(&line).await {
                warn!("Failed to send queued reply: {err:?}");
                self.state.record(tx_status(err));
                return Err(err);
            }
        }
        Ok(())
    }

    /// Frame and transmit `payload`, then wait for a reply, which is read
    /// into `reply`.
    pub async fn query<'b>(&mut self, payload: &str, reply: &'b mut [u8]) -> Result<&'b str> {
        let result = match self.frame(payload) {
            Ok(data) => {
                self.medium
                    .query(&data, reply, self.state.timeout_ms)
                    .await
            }
            Err(err) => Err(err),
        };
        let len = result.inspect_err(|&err| self.state.record(rx_status(err)))?;
        line(&reply[..len.min(reply.len())])
            .inspect_err(|&err| self.state.record(rx_status(err)))
    }

    pub async fn receive_string<'b>(&mut self, buf: &'b mut [u8]) -> Result<&'b str> {
        let len = self.medium.receive(buf, self.state.timeout_ms).await?;
        line(&buf[..len.min(buf.len())])
    }

    pub async fn clear_rx_buffer(&mut self) {
        self.medium.clear_rx_buffer().await;
    }

    /// Receive one line, if any, parse and dispatch it with `parser`, then
    /// transmit any replies the callback queued.
    ///
    /// Returns `None` if no line arrived within the timeout.
    pub async fn service<const N: usize>(
        &mut self,
        parser: &mut Parser<Self, N>,
    ) -> Result<Option<ErrorStatus>> {
        self.state.framer = parser.config().framer();

        let mut buf = [0u8; RX_BUFFER_SIZE];
        let len = match self.medium.receive(&mut buf, self.state.timeout_ms).await {
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

        self.flush().await?;
        Ok(Some(status))
    }

    fn frame(&self, payload: &str) -> Result<Line> {
        self.state.framer.frame_vec::<LINE_BUFFER_SIZE>(payload)
    }
}

impl<M: AsyncSerialMedium> AccessControl for AsyncSession<M> {
    fn access_level(&self) -> Permission {
        self.state.access_level
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::parser::{Request, Role};
    use core::fmt::Write;
    use core::pin::pin;
    use core::task::{Context, Poll, Waker};
    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    fn block_on<F: Future>(fut: F) -> F::Output {
        let mut fut = pin!(fut);
        let mut cx = Context::from_waker(Waker::noop());
        loop {
            if let Poll::Ready(output) = fut.as_mut().poll(&mut cx) {
                return output;
            }
        }
    }

    #[derive(Default)]
    struct Mock {
        sent: StdVec<StdVec<u8>>,
        incoming: VecDeque<&'static [u8]>,
        replies: VecDeque<&'static [u8]>,
        fail_sends: bool,
    }

    #[async_trait(?Send)]
    impl AsyncSerialMedium for Mock {
        async fn send(&mut self, data: &[u8]) -> Result<()> {
            if self.fail_sends {
                return Err(Error::Timeout);
            }
            self.sent.push(data.to_vec());
            Ok(())
        }

        async fn query(&mut self, data: &[u8], reply: &mut [u8], _: u32) -> Result<usize> {
            self.send(data).await?;
            let data = self.replies.pop_front().ok_or(Error::Timeout)?;
            reply[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        async fn receive(&mut self, buf: &mut [u8], _: u32) -> Result<usize> {
            let data = self.incoming.pop_front().ok_or(Error::NoData)?;
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        async fn clear_rx_buffer(&mut self) {
            self.incoming.clear();
        }
    }

    fn get_re(s: &mut AsyncSession<Mock>, _: &Request<'_>) -> ErrorStatus {
        let mut line: heapless::String<16> = heapless::String::new();
        let _ = write!(line, "!RE={:08X}", s.take_error_register().bits());
        s.reply(&line)
    }

    fn get_many(s: &mut AsyncSession<Mock>, _: &Request<'_>) -> ErrorStatus {
        for _ in 0..=MAX_PENDING_REPLIES {
            let status = s.reply("!MM");
            if !status.is_empty() {
                return status;
            }
        }
        ErrorStatus::empty()
    }

    fn parser() -> Parser<AsyncSession<Mock>, 4> {
        let mut parser = Parser::new(Role::Slave);
        parser.set_checksum_enabled(false);
        parser.set_terminator_crlf(false);
        let none = Permission::None;
        parser.add_command("RE", "", "?", None, Some(get_re), none, none).unwrap();
        parser.add_command("MM", "", "?", None, Some(get_many), none, none).unwrap();
        parser
    }

    #[test]
    fn service_sends_queued_reply() {
        let mut session = AsyncSession::new(Mock::default());
        let mut parser = parser();
        session.medium_mut().incoming.push_back(b"*RE?\r\n");

        let status = block_on(session.service(&mut parser));
        assert_eq!(status, Ok(Some(ErrorStatus::empty())));
        assert_eq!(session.medium().sent, [b"!RE=00000000\n"]);
        assert_eq!(session.pending_replies(), 0);

        assert_eq!(block_on(session.service(&mut parser)), Ok(None));
    }

    #[test]
    fn reply_queue_is_bounded() {
        let mut session = AsyncSession::new(Mock::default());
        let mut parser = parser();
        session.medium_mut().incoming.push_back(b"*MM?\n");

        let status = block_on(session.service(&mut parser));
        assert_eq!(status, Ok(Some(ErrorStatus::BUFFER_SIZE)));
        assert_eq!(session.medium().sent.len(), MAX_PENDING_REPLIES);
        assert_eq!(session.take_error_register(), ErrorStatus::BUFFER_SIZE);
    }

    #[test]
    fn failed_flush_keeps_remaining_replies() {
        let mut session = AsyncSession::new(Mock::default());
        assert!(session.reply("!A").is_empty());
        assert!(session.reply("!B").is_empty());
        session.medium_mut().fail_sends = true;

        assert_eq!(block_on(session.flush()), Err(Error::Timeout));
        assert_eq!(session.pending_replies(), 1);
        assert_eq!(session.error_register(), ErrorStatus::TX_TIMEOUT);

        session.medium_mut().fail_sends = false;
        assert_eq!(block_on(session.flush()), Ok(()));
        // "!B" + ':' = 33 + 66 + 58 = 157
        assert_eq!(session.medium().sent, [b"!B:57\r\n"]);
    }

    #[test]
    fn query_and_receive() {
        let mut session = AsyncSession::new(Mock::default());
        session.set_framer(Framer::new(false, false));
        session.medium_mut().replies.push_back(b"!PV=2.5\n");
        session.medium_mut().incoming.push_back(b"!KM=R\n");

        let mut reply = [0u8; 32];
        assert_eq!(block_on(session.query("*PV?", &mut reply)), Ok("!PV=2.5\n"));
        assert_eq!(session.medium().sent, [b"*PV?\n"]);

        let mut buf = [0u8; 32];
        assert_eq!(block_on(session.receive_string(&mut buf)), Ok("!KM=R\n"));

        let mut reply = [0u8; 32];
        assert_eq!(block_on(session.query("*PV?", &mut reply)), Err(Error::Timeout));
        assert_eq!(session.error_register(), ErrorStatus::RX_TIMEOUT);

        session.medium_mut().incoming.push_back(b"!KM=L\n");
        block_on(session.clear_rx_buffer());
        assert_eq!(block_on(session.receive_string(&mut buf)), Err(Error::NoData));
    }
}
