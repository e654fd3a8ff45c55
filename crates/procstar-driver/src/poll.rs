//! Done-flag polling.
//!
//! The accelerators have no completion interrupt: the host spins on a
//! status register. By default the loop is a tight, unbounded spin, which is
//! the hardware contract. An interval and a bound can be configured so that
//! tests and simulated boards cannot hang the caller.

use crate::error::{ProcStarError, Result};
use std::time::Duration;

/// Parameters for polling a done register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between polls; `None` spins.
    pub interval: Option<Duration>,
    /// Give up after this many polls; `None` polls forever.
    pub max_polls: Option<u64>,
}

impl PollConfig {
    /// Tight spin, no bound.
    pub const fn spin() -> Self {
        Self {
            interval: None,
            max_polls: None,
        }
    }

    /// Sleep `interval` between polls.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Fail with [`ProcStarError::Timeout`] after `max_polls` polls.
    #[must_use]
    pub const fn with_max_polls(mut self, max_polls: u64) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Call `probe` until it reports done; returns the number of polls taken.
    ///
    /// # Errors
    ///
    /// Propagates errors from `probe` and returns a timeout once the bound
    /// (if any) is exhausted.
    pub fn poll_until<F>(&self, mut probe: F) -> Result<u64>
    where
        F: FnMut() -> Result<bool>,
    {
        let mut polls = 0u64;
        loop {
            polls += 1;
            if probe()? {
                return Ok(polls);
            }
            if self.max_polls.is_some_and(|max| polls >= max) {
                return Err(ProcStarError::Timeout { polls });
            }
            match self.interval {
                Some(interval) => std::thread::sleep(interval),
                None => std::hint::spin_loop(),
            }
        }
    }
}
