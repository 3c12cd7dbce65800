// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! How a fired task's job actually gets run, grounded on `timer.go`'s
//! `GoPool` interface (`type GoPool interface { Go(f func()) }`, with the
//! package default simply doing `go f()`).

use std::thread;

/// Dispatches a job off the pump thread.
///
/// This is the seam a caller can use to route fired jobs through their own
/// worker pool instead of spawning a thread per firing; [`crate::Timer`]
/// takes any `Arc<dyn Executor>`. `submit` hands `job` back as the `Err`
/// payload if it can't be accepted right now (e.g. a bounded pool is full);
/// the timer's dispatch path falls back to spawning a thread for it rather
/// than drop a due task (spec.md §4.7).
pub trait Executor: Send + Sync {
    fn submit(&self, job: Box<dyn FnOnce() + Send>) -> Result<(), Box<dyn FnOnce() + Send>>;
}

/// The default [`Executor`]: one OS thread per fired job, the direct
/// analogue of the Go original's default `goroutine.Go`, which spawns a
/// goroutine per job.
///
/// Since this already *is* the "spawn a thread" fallback, a spawn failure
/// here has nowhere further to fall back to: `submit` logs and returns `Ok`
/// rather than handing the job back, because `std::thread::Builder::spawn`
/// drops its closure on failure and cannot return it to us anyway.
#[derive(Debug, Default)]
pub struct ThreadPerTaskExecutor;

impl ThreadPerTaskExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for ThreadPerTaskExecutor {
    fn submit(&self, job: Box<dyn FnOnce() + Send>) -> Result<(), Box<dyn FnOnce() + Send>> {
        let spawned = thread::Builder::new()
            .name("wheel-timer-job".to_owned())
            .spawn(job);
        if let Err(err) = spawned {
            tracing::error!(%err, "failed to spawn thread for fired task job");
        }
        Ok(())
    }
}
