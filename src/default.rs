// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A process-wide default [`Timer`], started on first use. Grounded on the
//! `timed` package (`timed/timed.go`), which wraps a single package-level
//! `*timer.Timer` (tick 1ms, default wheel size, auto-started in an `init`
//! function) behind free functions.

use std::sync::{Arc, OnceLock};

use crate::error::Closed;
use crate::job::Job;
use crate::task::Task;
use crate::timer::{Options, Timer};

fn global() -> &'static Arc<Timer> {
    static TIMER: OnceLock<Arc<Timer>> = OnceLock::new();
    TIMER.get_or_init(|| {
        let timer = Timer::new(Options::default());
        timer.start();
        timer
    })
}

/// The base tick span, in milliseconds, of the process-wide default timer.
#[must_use]
pub fn tick_ms() -> i64 {
    global().tick_ms()
}

/// The wheel size of the process-wide default timer.
#[must_use]
pub fn wheel_size() -> usize {
    global().wheel_size()
}

/// The base wheel's spoke mask of the process-wide default timer.
#[must_use]
pub fn wheel_mask() -> i64 {
    global().wheel_mask()
}

/// The number of tasks currently linked into the process-wide default timer.
#[must_use]
pub fn task_counter() -> i64 {
    global().task_counter()
}

/// Whether the process-wide default timer is running. Started automatically
/// on first use of any function in this module, so this is normally `true`
/// unless [`stop`] was called.
#[must_use]
pub fn started() -> bool {
    global().started()
}

/// Restarts the process-wide default timer after a [`stop`].
pub fn start() {
    global().start();
}

/// Stops the process-wide default timer's pump thread.
pub fn stop() {
    global().stop();
}

/// Admits `task` to the process-wide default timer.
///
/// # Errors
///
/// Returns [`Closed`] if [`stop`] was called and [`start`] hasn't been
/// called since.
pub fn add_task(task: Arc<Task>) -> Result<(), Closed> {
    global().add_task(task)
}

/// Builds a task from a plain closure and admits it to the process-wide
/// default timer.
///
/// # Errors
///
/// Returns [`Closed`] under the same conditions as [`add_task`].
pub fn after_fn(delay_ms: i64, job: impl FnMut() + Send + 'static) -> Result<Arc<Task>, Closed> {
    global().after_fn(delay_ms, job)
}

/// Builds a task from a [`Job`] and admits it to the process-wide default
/// timer.
///
/// # Errors
///
/// Returns [`Closed`] under the same conditions as [`add_task`].
pub fn after(delay_ms: i64, job: Box<dyn Job>) -> Result<Arc<Task>, Closed> {
    global().after(delay_ms, job)
}
