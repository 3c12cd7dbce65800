// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The public handle a caller holds for a scheduled unit of work, grounded
//! on `task.go`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::entry::Entry;
use crate::job::{Job, JobFn};

/// A task submitted to a [`crate::Timer`].
///
/// A `Task` outlives any single [`Entry`] it is bound to: rescheduling via
/// [`Task::set_delay`] while the task is already in the wheel, or the
/// Timer re-admitting the task after it fires, each create and bind a fresh
/// `Entry`. The task itself is the stable identity a caller holds on to.
pub struct Task {
    delay_ms: AtomicI64,
    job: Mutex<Box<dyn Job>>,
    entry: Mutex<Option<Arc<Entry>>>,
}

impl Task {
    /// Creates a task with the given delay (in milliseconds) and an empty
    /// job, mirroring `task.go`'s `NewTask`: a bare task is inert until a
    /// job is attached with [`with_job`](Self::with_job) or
    /// [`with_job_fn`](Self::with_job_fn).
    #[must_use]
    pub fn new(delay_ms: i64) -> Arc<Task> {
        Arc::new(Self {
            delay_ms: AtomicI64::new(delay_ms),
            job: Mutex::new(crate::job::empty_job()),
            entry: Mutex::new(None),
        })
    }

    /// Attaches `job` as the work this task runs on expiry, replacing
    /// whatever job it held before. Mirrors `task.go`'s `WithJob`; chains off
    /// [`new`](Self::new) the way a builder would, except on an `Arc` rather
    /// than `&mut self`, since a `Task` is always shared from the moment a
    /// caller can reach it.
    #[must_use]
    pub fn with_job(self: Arc<Self>, job: Box<dyn Job>) -> Arc<Task> {
        *self.job.lock().unwrap() = job;
        self
    }

    /// Like [`with_job`](Self::with_job), but taking a plain closure.
    /// Mirrors `task.go`'s `WithJobFunc`.
    #[must_use]
    pub fn with_job_fn(self: Arc<Self>, f: impl FnMut() + Send + 'static) -> Arc<Task> {
        self.with_job(Box::new(JobFn::new(f)))
    }

    /// Creates a task with the given delay (in milliseconds) and job in one
    /// step. Sugar over [`new`](Self::new) + [`with_job`](Self::with_job).
    #[must_use]
    pub fn new_with_job(delay_ms: i64, job: Box<dyn Job>) -> Arc<Task> {
        Self::new(delay_ms).with_job(job)
    }

    /// Creates a task from a plain `FnMut`, for callers who don't need a
    /// named [`Job`] type. Sugar over [`new`](Self::new) +
    /// [`with_job_fn`](Self::with_job_fn); mirrors `timed.go`'s
    /// `NewTaskFunc`.
    #[must_use]
    pub fn with_fn(delay_ms: i64, f: impl FnMut() + Send + 'static) -> Arc<Task> {
        Self::new(delay_ms).with_job_fn(f)
    }

    /// The delay, in milliseconds, most recently set for this task.
    ///
    /// This is a snapshot: if the task is already scheduled, its frozen
    /// expiration in the wheel was computed from whatever delay was current
    /// when it was admitted, not from the value currently stored here.
    #[must_use]
    pub fn delay_ms(&self) -> i64 {
        self.delay_ms.load(Ordering::Acquire)
    }

    /// Changes the delay that will be used the *next* time this task is
    /// admitted to a timer. Mirrors `task.go`'s `SetDelay`: it does not by
    /// itself move an already-scheduled task, callers re-add it to apply
    /// the new delay immediately.
    pub fn set_delay(&self, delay_ms: i64) {
        self.delay_ms.store(delay_ms, Ordering::Release);
    }

    /// Cancels this task: if it is currently linked into a wheel, detaches
    /// and discards that binding. A no-op if the task already fired or was
    /// already cancelled. Mirrors `task.go`'s `Cancel`.
    pub fn cancel(&self) {
        // The entry lock is held only long enough to take the pointer; the
        // actual detach-from-spoke work happens afterward, with the lock
        // released, so `Task.entry`'s lock is never held while acquiring a
        // `Spoke`'s lock (the lock hierarchy spec.md §5 requires).
        let entry = self.entry.lock().unwrap().take();
        if let Some(entry) = entry {
            tracing::trace!(expiration_ms = entry.expiration_ms, "cancelling task");
            Entry::remove_self(&entry);
        }
    }

    /// True if this task is currently linked into some spoke, i.e. it will
    /// fire (or be cascaded further) unless cancelled first.
    #[must_use]
    pub fn activated(&self) -> bool {
        self.entry
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|e| e.owner().is_some())
    }

    /// The absolute expiration (in the timer clock's milliseconds) this
    /// task is currently scheduled for, or `-1` if it is not
    /// [`activated`](Self::activated). Mirrors `task.go`'s `Expiry`.
    #[must_use]
    pub fn expiry(&self) -> i64 {
        let guard = self.entry.lock().unwrap();
        match guard.as_ref() {
            Some(entry) if entry.owner().is_some() => entry.expiration_ms,
            _ => -1,
        }
    }

    /// Binds this task to a freshly-created entry, discarding whatever
    /// entry it was previously bound to (if any). Called once by
    /// [`crate::Timer::add_task`] per admission.
    pub(crate) fn bind_entry(&self, entry: Arc<Entry>) {
        let previous = self.entry.lock().unwrap().replace(entry);
        if let Some(previous) = previous {
            Entry::remove_self(&previous);
        }
    }

    /// Clears the task's entry pointer if it still points at `entry`. Called
    /// once an entry has fired (or been found cancelled) and is retiring for
    /// good, so [`Task::activated`] reports `false` afterward.
    pub(crate) fn clear_entry_if(&self, entry: &Arc<Entry>) {
        let mut guard = self.entry.lock().unwrap();
        if guard.as_ref().is_some_and(|e| Arc::ptr_eq(e, entry)) {
            *guard = None;
        }
    }

    /// True if `entry` is still this task's current binding. Used by
    /// [`Entry::is_cancelled`] to detect that a task moved on (via
    /// `set_delay` + re-add, or `cancel`) while the entry was mid-cascade.
    pub(crate) fn owns_entry(&self, entry: &Arc<Entry>) -> bool {
        self.entry
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|e| Arc::ptr_eq(e, entry))
    }

    pub(crate) fn run_job(&self) {
        let mut job = self.job.lock().unwrap();
        crate::job::run_catching(&mut **job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spoke::Spoke;
    use std::sync::atomic::AtomicI64;

    /// Links a fresh entry for `task` into `spoke`, which the caller must
    /// keep alive for as long as the returned entry might be dereferenced
    /// through its (unowned) `owner` pointer — mirrors the real invariant
    /// that a spoke always outlives any entry linked into it.
    fn linked_entry(task: &Arc<Task>, spoke: &Arc<Spoke>, expiration_ms: i64) -> Arc<Entry> {
        let entry = Entry::new(expiration_ms, Arc::clone(task));
        task.bind_entry(Arc::clone(&entry));
        spoke.add(Arc::clone(&entry));
        entry
    }

    fn new_spoke() -> Arc<Spoke> {
        Arc::new(Spoke::new(Arc::new(AtomicI64::new(0))))
    }

    #[test]
    fn fresh_task_is_not_activated() {
        let task = Task::with_fn(100, || {});
        assert!(!task.activated());
        assert_eq!(task.expiry(), -1);
    }

    #[test]
    fn activated_once_linked_into_a_spoke() {
        let task = Task::with_fn(100, || {});
        let spoke = new_spoke();
        let entry = linked_entry(&task, &spoke, 100);
        assert!(task.activated());
        assert_eq!(task.expiry(), 100);
        drop(entry);
    }

    #[test]
    fn cancel_detaches_entry_and_is_idempotent() {
        let task = Task::with_fn(100, || {});
        let spoke = new_spoke();
        linked_entry(&task, &spoke, 100);
        task.cancel();
        assert!(!task.activated());
        assert_eq!(task.expiry(), -1);
        task.cancel();
        assert!(!task.activated());
    }

    #[test]
    fn rebinding_detaches_previous_entry() {
        let task = Task::with_fn(100, || {});
        let spoke = new_spoke();
        let first = linked_entry(&task, &spoke, 100);
        assert!(first.owner().is_some());

        let second = Entry::new(200, Arc::clone(&task));
        task.bind_entry(Arc::clone(&second));

        assert!(first.owner().is_none());
        assert!(first.is_cancelled());
        assert_eq!(task.expiry(), -1);
        assert!(!second.is_cancelled());
    }

    #[test]
    fn with_job_replaces_pending_job() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let task = Task::new(100).with_job_fn(move || {
            ran_clone.store(true, Ordering::SeqCst);
        });
        task.run_job();
        assert!(ran.load(Ordering::SeqCst));
    }
}
