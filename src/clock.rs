// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A pluggable millisecond wall-clock source.
//!
//! The wheel itself only ever needs "now, in milliseconds" and "sleep until
//! roughly this deadline". [`ClockSource`] is the seam that lets tests
//! substitute a virtual clock instead of sleeping in real time.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Supplies the current time, in milliseconds, to a [`crate::Timer`].
///
/// Implementations must be monotonic: `now_ms()` must never return a value
/// smaller than one it has already returned. [`SystemClock`] upholds this by
/// measuring elapsed time off a fixed [`Instant`] rather than reading the
/// wall clock directly.
pub trait ClockSource: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> i64;
}

/// The default [`ClockSource`]: monotonic time since process start.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now_ms(&self) -> i64 {
        // Saturate rather than panic: a multi-decade uptime overflowing i64
        // milliseconds isn't a case worth crashing the scheduler over.
        i64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// A cheaply-cloneable handle to a [`ClockSource`].
///
/// `Timer` stores one `Clock`; every `Wheel`, `Spoke` and `DelayQueue` it
/// owns reads through the same handle, so advancing or substituting the
/// clock affects the whole tree uniformly.
#[derive(Clone, Debug)]
pub struct Clock(Arc<dyn ClockSource>);

impl Clock {
    pub fn new(source: impl ClockSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemClock::new())
    }

    #[inline]
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.0.now_ms()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
