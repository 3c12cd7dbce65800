// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A priority queue of spokes, ordered by expiration, that the pump thread
//! blocks on. Grounded on `delayqueue/delay_queue.go`.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::heap::BinaryHeap;
use crate::spoke::Spoke;

struct State {
    heap: BinaryHeap<Arc<Spoke>>,
    waiting: bool,
    closed: bool,
}

/// What [`DelayQueue::take`] returns.
pub(crate) enum Take {
    /// A spoke whose expiration has passed.
    Spoke(Arc<Spoke>),
    /// [`DelayQueue::close`] was called; the pump should exit.
    Closed,
}

/// Orders spokes by how soon their expiration is, and lets one consumer
/// block until the earliest one is due.
///
/// The "one-slot wake channel" from `delayqueue/delay_queue.go` (a
/// non-blocking buffered `chan struct{}` used purely to coalesce wakeups) is
/// realized here with a [`Condvar`]: `notify_one` is a no-op when nobody is
/// parked in [`Condvar::wait`]/[`Condvar::wait_timeout`], which is exactly
/// the "send only if nobody's listening yet" behavior the Go channel send
/// gives for free.
pub(crate) struct DelayQueue {
    clock: Clock,
    state: Mutex<State>,
    condvar: Condvar,
}

impl DelayQueue {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            state: Mutex::new(State {
                heap: BinaryHeap::new(|a: &Arc<Spoke>, b: &Arc<Spoke>| {
                    a.expiration_ms() < b.expiration_ms()
                }),
                waiting: false,
                closed: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Enqueues `spoke`. Wakes a blocked [`DelayQueue::take`] only if `spoke`
    /// became the new earliest deadline and a consumer is actually waiting,
    /// mirroring `delayqueue/delay_queue.go`'s `Offer`.
    pub(crate) fn add(&self, spoke: Arc<Spoke>) {
        let mut state = self.state.lock().unwrap();
        state.heap.push(Arc::clone(&spoke));
        let became_root = state
            .heap
            .peek()
            .is_some_and(|root| Arc::ptr_eq(root, &spoke));
        let should_wake = became_root && state.waiting;
        if should_wake {
            state.waiting = false;
        }
        drop(state);
        if should_wake {
            self.condvar.notify_one();
        }
    }

    /// Blocks until the earliest spoke's expiration has passed, or the
    /// queue is [`close`](Self::close)d. Mirrors `delayqueue/delay_queue.go`'s
    /// `Take`.
    pub(crate) fn take(&self) -> Take {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return Take::Closed;
            }
            match state.heap.peek() {
                None => {
                    state.waiting = true;
                    state = self.condvar.wait(state).unwrap();
                }
                Some(head) => {
                    let delay_ms = head.expiration_ms() - self.clock.now_ms();
                    if delay_ms <= 0 {
                        let head = state.heap.pop().expect("peeked Some above");
                        return Take::Spoke(head);
                    }
                    state.waiting = true;
                    #[allow(clippy::cast_sign_loss)]
                    let timeout = Duration::from_millis(delay_ms as u64);
                    let (s, _timed_out) = self.condvar.wait_timeout(state, timeout).unwrap();
                    state = s;
                }
            }
        }
    }

    /// Non-blocking: pops the earliest spoke if it is already due, otherwise
    /// returns `None` without waiting. Mirrors `delayqueue/delay_queue.go`'s
    /// `Poll`.
    pub(crate) fn poll(&self) -> Option<Arc<Spoke>> {
        let mut state = self.state.lock().unwrap();
        match state.heap.peek() {
            Some(head) if head.expiration_ms() <= self.clock.now_ms() => state.heap.pop(),
            _ => None,
        }
    }

    /// Signals every blocked [`take`](Self::take) to exit. Idempotent.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        drop(state);
        self.condvar.notify_all();
    }

    /// Clears `closed` so a freshly-spawned pump thread's [`take`](Self::take)
    /// blocks and waits again instead of exiting immediately. Mirrors
    /// `delayqueue/delay_queue.go`'s reopened-channel semantics on restart:
    /// `timer.go`'s `Start` recreates `exitC` rather than leaving the one
    /// `Stop` closed, so [`Timer::start`](crate::timer::Timer::start) calls
    /// this before spawning the new pump thread. Any spoke still in the heap
    /// (admitted before the previous `stop`, or since) is untouched, so
    /// whatever became due during the pause is delivered on the very next
    /// `take`.
    pub(crate) fn reopen(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = false;
        state.waiting = false;
    }
}
