// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The hierarchical timing wheel itself, grounded on `timing_wheel.go`.
//!
//! Each level is a fixed number of [`Spoke`]s spanning `tick_ms *
//! wheel_size` milliseconds; a task whose expiration falls further out than
//! that gets pushed to a lazily-created overflow wheel one level coarser
//! (`tick_ms` of the overflow level equals `interval_ms` of this one), and
//! is cascaded back down a level at a time as the clock advances, exactly
//! as `timing_wheel.go`'s `add`/`advanceClock` do.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use crate::delay_queue::DelayQueue;
use crate::entry::Entry;
use crate::spoke::Spoke;

/// The result of attempting to place an entry into a wheel.
pub(crate) enum AddOutcome {
    /// Linked into a spoke (possibly in an overflow wheel); will fire or
    /// cascade later.
    Scheduled,
    /// The entry's expiration has already passed (or is within the next
    /// tick); the caller should dispatch it now instead of scheduling it.
    AlreadyExpired,
    /// The entry was cancelled (or superseded by a later binding) before it
    /// could be placed.
    Canceled,
}

/// `current_time_ms` and `overflow` are grouped under one `RwLock` because
/// they must be observed together consistently: `timing_wheel.go` protects
/// both fields with a single `sync.RWMutex` for the same reason (`add` reads
/// both to decide whether this level or a coarser one owns an insertion,
/// and `advanceClock` writes both when flushing promotes a spoke boundary
/// past the clock).
struct State {
    current_time_ms: i64,
    overflow: Option<Arc<Wheel>>,
}

pub(crate) struct Wheel {
    tick_ms: i64,
    interval_ms: i64,
    wheel_mask: i64,
    spokes: Box<[Arc<Spoke>]>,
    state: RwLock<State>,
    task_counter: Arc<AtomicI64>,
    delay_queue: Arc<DelayQueue>,
}

impl Wheel {
    pub(crate) fn new(
        tick_ms: i64,
        wheel_size: usize,
        start_ms: i64,
        task_counter: Arc<AtomicI64>,
        delay_queue: Arc<DelayQueue>,
    ) -> Self {
        let spokes = (0..wheel_size)
            .map(|_| Arc::new(Spoke::new(Arc::clone(&task_counter))))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            tick_ms,
            #[allow(clippy::cast_possible_wrap)]
            interval_ms: tick_ms * wheel_size as i64,
            #[allow(clippy::cast_possible_wrap)]
            wheel_mask: wheel_size as i64 - 1,
            spokes,
            state: RwLock::new(State {
                current_time_ms: truncate_to_tick(start_ms, tick_ms),
                overflow: None,
            }),
            task_counter,
            delay_queue,
        }
    }

    /// Attempts to place `entry` into this wheel (or a coarser overflow
    /// wheel it lazily creates), mirroring `timing_wheel.go`'s `add`.
    pub(crate) fn add(&self, entry: Arc<Entry>) -> AddOutcome {
        if entry.is_cancelled() {
            return AddOutcome::Canceled;
        }
        let expiration_ms = entry.expiration_ms;
        let current_time_ms = self.state.read().unwrap().current_time_ms;

        if expiration_ms < current_time_ms + self.tick_ms {
            return AddOutcome::AlreadyExpired;
        }

        if expiration_ms < current_time_ms + self.interval_ms {
            let virtual_id = expiration_ms.div_euclid(self.tick_ms);
            // ANDing with `wheel_mask` (a small power-of-two-minus-one) keeps
            // only the low bits, so the result is non-negative regardless of
            // `virtual_id`'s sign.
            #[allow(clippy::cast_sign_loss)]
            let slot = (virtual_id & self.wheel_mask) as usize;
            let spoke = &self.spokes[slot];
            spoke.add(entry);
            if spoke.set_expiration(virtual_id * self.tick_ms) {
                self.delay_queue.add(Arc::clone(spoke));
            }
            return AddOutcome::Scheduled;
        }

        self.overflow(current_time_ms).add(entry)
    }

    /// Returns this wheel's overflow wheel, creating it on first use.
    /// Mirrors the lazily-initialized `overflowWheel` in `timing_wheel.go`,
    /// which the original guards with the same `sync.RWMutex` as
    /// `currentTime` (double-checked under the write lock here for the same
    /// reason: cheap read-mostly access, rare one-time initialization).
    fn overflow(&self, current_time_ms: i64) -> Arc<Wheel> {
        if let Some(wheel) = &self.state.read().unwrap().overflow {
            return Arc::clone(wheel);
        }
        let mut state = self.state.write().unwrap();
        if let Some(wheel) = &state.overflow {
            return Arc::clone(wheel);
        }
        let wheel = Arc::new(Wheel::new(
            self.interval_ms,
            self.spokes.len(),
            current_time_ms,
            Arc::clone(&self.task_counter),
            Arc::clone(&self.delay_queue),
        ));
        tracing::debug!(
            tick_ms = self.interval_ms,
            "creating overflow wheel"
        );
        state.overflow = Some(Arc::clone(&wheel));
        wheel
    }

    /// Advances this wheel's notion of "now" to `now_ms`, truncated down to
    /// a tick boundary, and recurses into the overflow wheel if one exists.
    /// Mirrors `timing_wheel.go`'s `advanceClock`. Only the pump thread
    /// calls this.
    pub(crate) fn advance_clock(&self, now_ms: i64) {
        let mut state = self.state.write().unwrap();
        if now_ms < state.current_time_ms + self.tick_ms {
            return;
        }
        let truncated = truncate_to_tick(now_ms, self.tick_ms);
        state.current_time_ms = truncated;
        let overflow = state.overflow.clone();
        drop(state);
        if let Some(overflow) = overflow {
            overflow.advance_clock(truncated);
        }
    }

    pub(crate) fn task_counter(&self) -> i64 {
        self.task_counter.load(Ordering::Relaxed)
    }
}

fn truncate_to_tick(ms: i64, tick_ms: i64) -> i64 {
    ms - ms.rem_euclid(tick_ms)
}
