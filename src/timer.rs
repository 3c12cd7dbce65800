// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The public facade tying the wheel, delay queue and pump thread together,
//! grounded on `timer.go`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::clock::Clock;
use crate::delay_queue::{DelayQueue, Take};
use crate::entry::Entry;
use crate::error::Closed;
use crate::executor::{Executor, ThreadPerTaskExecutor};
use crate::job::Job;
use crate::task::Task;
use crate::wheel::{AddOutcome, Wheel};

/// Constructor options for [`Timer`], mirroring `timer.go`'s functional
/// options (`WithTickMs`, `WithWheelSize`, `WithGoPool`).
pub struct Options {
    tick_ms: i64,
    wheel_size: usize,
    clock: Clock,
    executor: Arc<dyn Executor>,
}

impl Default for Options {
    /// Matches `NewTimer`'s defaults: a 1ms tick and a 32-slot wheel.
    fn default() -> Self {
        Self {
            tick_ms: 1,
            wheel_size: 32,
            clock: Clock::system(),
            executor: Arc::new(ThreadPerTaskExecutor::new()),
        }
    }
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The base tick span, in milliseconds. Must be at least 1.
    #[must_use]
    pub fn tick_ms(mut self, tick_ms: i64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    /// The number of spokes per wheel level. Rounded up to the next power of
    /// two, matching `WithWheelSize`'s use of `NextPowOf2`.
    #[must_use]
    pub fn wheel_size(mut self, wheel_size: usize) -> Self {
        self.wheel_size = wheel_size;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }
}

fn next_power_of_two(x: usize) -> usize {
    if x.is_power_of_two() {
        x
    } else {
        x.next_power_of_two()
    }
}

struct Lifecycle {
    closed: bool,
    pump: Option<JoinHandle<()>>,
}

/// A hierarchical timing wheel: admits [`Task`]s with a delay and runs their
/// job once that delay elapses, without a per-task OS timer.
pub struct Timer {
    tick_ms: i64,
    wheel_size: usize,
    clock: Clock,
    task_counter: Arc<AtomicI64>,
    delay_queue: Arc<DelayQueue>,
    wheel: Wheel,
    executor: Arc<dyn Executor>,
    lifecycle: Mutex<Lifecycle>,
}

impl Timer {
    /// Builds a new, unstarted timer.
    ///
    /// # Panics
    ///
    /// Panics if `tick_ms < 1` or `wheel_size == 0`, mirroring `NewTimer`'s
    /// own panics on invalid options: these are programmer errors, not
    /// something a caller should need to handle at runtime.
    #[must_use]
    pub fn new(options: Options) -> Arc<Timer> {
        assert!(options.tick_ms >= 1, "timer: tick must be >= 1ms");
        assert!(options.wheel_size > 0, "timer: wheel size must be > 0");
        let wheel_size = next_power_of_two(options.wheel_size);
        let task_counter = Arc::new(AtomicI64::new(0));
        let delay_queue = Arc::new(DelayQueue::new(options.clock.clone()));
        let wheel = Wheel::new(
            options.tick_ms,
            wheel_size,
            options.clock.now_ms(),
            Arc::clone(&task_counter),
            Arc::clone(&delay_queue),
        );
        Arc::new(Self {
            tick_ms: options.tick_ms,
            wheel_size,
            clock: options.clock,
            task_counter,
            delay_queue,
            wheel,
            executor: options.executor,
            lifecycle: Mutex::new(Lifecycle {
                closed: true,
                pump: None,
            }),
        })
    }

    pub fn tick_ms(&self) -> i64 {
        self.tick_ms
    }

    pub fn wheel_size(&self) -> usize {
        self.wheel_size
    }

    /// The base wheel's spoke mask (`wheel_size - 1`), mirroring `timer.go`'s
    /// implicit `NextPowOf2(size) - 1` used to index spokes. Exposed mainly
    /// for diagnostics; callers never need to compute a slot index
    /// themselves.
    #[must_use]
    pub fn wheel_mask(&self) -> i64 {
        #[allow(clippy::cast_possible_wrap)]
        let size = self.wheel_size as i64;
        size - 1
    }

    pub fn task_counter(&self) -> i64 {
        self.task_counter.load(Ordering::Relaxed)
    }

    /// Whether the timer's pump thread is currently running.
    #[must_use]
    pub fn started(&self) -> bool {
        !self.lifecycle.lock().unwrap().closed
    }

    /// Starts the pump thread. A no-op if already started.
    pub fn start(self: &Arc<Self>) {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if !lifecycle.closed {
            return;
        }
        lifecycle.closed = false;
        self.delay_queue.reopen();
        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("wheel-timer-pump".to_owned())
            .spawn(move || this.pump())
            .expect("failed to spawn timer pump thread");
        lifecycle.pump = Some(handle);
        tracing::debug!(tick_ms = self.tick_ms, wheel_size = self.wheel_size, "timer started");
    }

    /// Stops the pump thread and blocks until it has exited.
    ///
    /// Tasks already admitted stay linked in the wheel; restarting the
    /// timer later resumes advancing it and will fire (or cascade) anything
    /// whose expiration has already passed by the time the clock catches
    /// up, exactly as `advanceClock` would after any pause.
    pub fn stop(&self) {
        let handle = {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            if lifecycle.closed {
                return;
            }
            lifecycle.closed = true;
            lifecycle.pump.take()
        };
        self.delay_queue.close();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        tracing::debug!("timer stopped");
    }

    /// Mirrors `timer.go`'s pump goroutine, including its drain-while-due
    /// inner loop: once `take` returns a spoke, keep advancing and flushing
    /// via the non-blocking `poll` for as long as another spoke is already
    /// due, rather than going back through `take`'s wait machinery for
    /// every flush in a burst.
    fn pump(&self) {
        loop {
            match self.delay_queue.take() {
                Take::Closed => return,
                Take::Spoke(mut spoke) => loop {
                    self.wheel.advance_clock(spoke.expiration_ms());
                    spoke.flush(|entry| self.reinsert(entry));
                    match self.delay_queue.poll() {
                        Some(next) => spoke = next,
                        None => break,
                    }
                },
            }
        }
    }

    /// Admits `task`, computing its frozen expiration from its current
    /// delay and the timer's clock. Mirrors `timer.go`'s `AddTask`.
    ///
    /// # Errors
    ///
    /// Returns [`Closed`] if the timer has not been started (or has been
    /// [`stop`](Self::stop)ped).
    pub fn add_task(&self, task: Arc<Task>) -> Result<(), Closed> {
        if !self.started() {
            return Err(Closed(()));
        }
        let expiration_ms = self.clock.now_ms() + task.delay_ms();
        let entry = Entry::new(expiration_ms, Arc::clone(&task));
        task.bind_entry(Arc::clone(&entry));
        let outcome = self.wheel.add(Arc::clone(&entry));
        self.handle_outcome(entry, outcome);
        Ok(())
    }

    /// Convenience constructor mirroring `timer.go`'s `AfterFunc`: builds a
    /// task from a plain closure, admits it, and returns the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Closed`] under the same conditions as [`add_task`](Self::add_task).
    pub fn after_fn(
        &self,
        delay_ms: i64,
        job: impl FnMut() + Send + 'static,
    ) -> Result<Arc<Task>, Closed> {
        let task = Task::with_fn(delay_ms, job);
        self.add_task(Arc::clone(&task))?;
        Ok(task)
    }

    /// Like [`after_fn`](Self::after_fn) but taking a named [`Job`].
    ///
    /// # Errors
    ///
    /// Returns [`Closed`] under the same conditions as [`add_task`](Self::add_task).
    pub fn after(&self, delay_ms: i64, job: Box<dyn Job>) -> Result<Arc<Task>, Closed> {
        let task = Task::new_with_job(delay_ms, job);
        self.add_task(Arc::clone(&task))?;
        Ok(task)
    }

    /// Re-evaluates an already-admitted entry after a cascade flush.
    /// Mirrors `timer.go`'s `reinsert`, which is nothing more than calling
    /// `AddTask` again on the same task: the entry's `expiration_ms` is
    /// frozen, so re-running `wheel.add` on it either demotes it to a
    /// finer-grained wheel, or reports it's due now.
    fn reinsert(&self, entry: Arc<Entry>) {
        let outcome = self.wheel.add(Arc::clone(&entry));
        self.handle_outcome(entry, outcome);
    }

    fn handle_outcome(&self, entry: Arc<Entry>, outcome: AddOutcome) {
        match outcome {
            AddOutcome::Scheduled => return,
            AddOutcome::Canceled => {
                tracing::trace!(expiration_ms = entry.expiration_ms, "dropping cancelled entry");
                return;
            }
            AddOutcome::AlreadyExpired => {}
        }
        if entry.is_cancelled() {
            tracing::trace!(
                expiration_ms = entry.expiration_ms,
                "entry superseded before dispatch, dropping"
            );
            return;
        }
        let task = entry.task();
        task.clear_entry_if(&entry);
        tracing::trace!(expiration_ms = entry.expiration_ms, "dispatching due task");
        drop(entry);
        self.dispatch(Box::new(move || task.run_job()));
    }

    /// Hands `job` to the configured [`Executor`], falling back to a
    /// directly-spawned thread if it's rejected, so a due task is never
    /// silently dropped (spec.md §4.7).
    fn dispatch(&self, job: Box<dyn FnOnce() + Send>) {
        let Err(job) = self.executor.submit(job) else {
            return;
        };
        tracing::warn!("executor rejected job, falling back to a spawned thread");
        let spawned = std::thread::Builder::new()
            .name("wheel-timer-fallback".to_owned())
            .spawn(job);
        if let Err(err) = spawned {
            tracing::error!(%err, "fallback thread spawn also failed, dropping due task");
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
