// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

use std::time::Duration;

/// The shortest interval between two lock status polls.
const MIN_LOCK_POLL: Duration = Duration::from_micros(10);

/// Waits used while reprogramming PLLs.
///
/// [`Timing::default`] matches the sun8i hardware. You may lengthen
/// the waits when your register accesses are slow (for instance,
/// through a debug probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    lock_timeout: Duration,
    lock_poll: Duration,
    settle: Duration,
    unlocked_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(70),
            lock_poll: Duration::from_micros(100),
            settle: Duration::from_micros(10),
            unlocked_settle: Duration::from_micros(500),
        }
    }
}

impl Timing {
    /// How long to wait for a PLL to report lock.
    ///
    /// Exceeding this is an [`Error::LockTimeout`](crate::Error::LockTimeout).
    pub const fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Interval between two lock status reads.
    pub const fn lock_poll(&self) -> Duration {
        self.lock_poll
    }

    /// Wait after each monotonic factor step.
    pub const fn settle(&self) -> Duration {
        self.settle
    }

    /// Wait used instead of polling when a PLL has no lock bit.
    pub const fn unlocked_settle(&self) -> Duration {
        self.unlocked_settle
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The implementation enforces a minimum poll interval of 10us.
    pub fn with_lock_poll(mut self, poll: Duration) -> Self {
        self.lock_poll = poll.max(MIN_LOCK_POLL);
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_unlocked_settle(mut self, settle: Duration) -> Self {
        self.unlocked_settle = settle;
        self
    }
}
