//! Async handoff - for tasks running on an async executor.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::handoff::CommsOwnership;

/// Yield delay for async handoff polling.
///
/// Application must provide an implementation of this trait in order for the
/// requester to be able to yield while waiting for the owner.
///
/// This trait keeps `duci` free of any specific async runtime.
///
/// Example:
///
/// ```rust,ignore
/// use embassy_time::{Duration, Timer};
/// struct Delay;
/// impl AsyncDelay for Delay {
///     async fn delay() {
///         Timer::after(Duration::from_millis(100)).await;
///     }
/// }
/// ```
pub trait AsyncDelay {
    fn delay() -> impl Future<Output = ()>;
}

impl CommsOwnership {
    /// Requester: async version of [`CommsOwnership::suspend()`]
    pub async fn suspend_async<D: AsyncDelay>(&self) {
        self.request();
        while self.is_requested() {
            D::delay().await;
        }
        debug!("Comms ownership handed over");
    }
}
