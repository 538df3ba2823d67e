//! Ownership handoff for a comms channel.
//!
//! A channel is normally serviced by one owning task.  Another task can ask
//! for temporary exclusive use of it with [`CommsOwnership::suspend()`],
//! which blocks until the owner notices the request (typically in its
//! polling loop, via [`CommsOwnership::is_requested()`]), stops using the
//! channel and calls [`CommsOwnership::resume()`].
//!
//! There is no queueing or fairness.  At most one outstanding requester and
//! one owner per channel are supported, and this is not checked.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;
pub mod sync;

#[cfg(feature = "async")]
pub use futures::AsyncDelay;
pub use sync::Delay;

use core::sync::atomic::{AtomicU8, Ordering};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Interval in ms a requester is expected to sleep between polls
pub const HANDOFF_POLL_MS: u32 = 100;

/// State of a comms channel's ownership
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The owning task is servicing the channel
    #[default]
    Owned = 0,
    /// Another task has asked for the channel
    Requested = 1,
}

impl From<u8> for Ownership {
    fn from(value: u8) -> Self {
        match value {
            1 => Ownership::Requested,
            _ => Ownership::Owned,
        }
    }
}

/// Ownership flag for one comms channel.
///
/// Can be placed in a `static` and shared between the owning task and a
/// requester.
///
/// ```rust,ignore
/// static SERIAL_OWNERSHIP: CommsOwnership = CommsOwnership::new();
///
/// // Owner's loop
/// loop {
///     if SERIAL_OWNERSHIP.is_requested() {
///         // Stop using the channel
///         SERIAL_OWNERSHIP.resume();
///     }
///     session.service(&mut parser)?;
/// }
/// ```
#[derive(Debug, Default)]
pub struct CommsOwnership {
    state: AtomicU8,
}

impl CommsOwnership {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(Ownership::Owned as u8),
        }
    }

    /// Current state
    pub fn state(&self) -> Ownership {
        Ownership::from(self.state.load(Ordering::Acquire))
    }

    /// Owner: check whether a requester is waiting
    pub fn is_requested(&self) -> bool {
        self.state() == Ownership::Requested
    }

    /// Owner: hand the channel over, releasing a waiting requester
    pub fn resume(&self) {
        debug!("Comms ownership resumed");
        self.state.store(Ownership::Owned as u8, Ordering::Release);
    }

    fn request(&self) {
        debug!("Comms ownership requested");
        self.state.store(Ownership::Requested as u8, Ordering::Release);
    }
}
