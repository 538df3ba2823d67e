//! Blocking handoff - typically used by RTOS tasks.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::handoff::CommsOwnership;

/// Blocking delay between handoff polls.
///
/// Application must provide an implementation, so the requester can sleep
/// while waiting, typically for [`crate::handoff::HANDOFF_POLL_MS`].
///
/// Example:
///
/// ```rust,ignore
/// struct Sleep;
/// impl Delay for Sleep {
///     fn delay() {
///         os_time_dly(HANDOFF_POLL_MS);
///     }
/// }
/// ```
pub trait Delay {
    fn delay();
}

impl CommsOwnership {
    /// Requester: ask for the channel and block until the owner has
    /// released it with [`CommsOwnership::resume()`].
    pub fn suspend<D: Delay>(&self) {
        self.request();
        while self.is_requested() {
            D::delay();
        }
        debug!("Comms ownership handed over");
    }
}
