// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A hierarchical timing-wheel scheduler for large populations of deferred
//! tasks.
//!
//! Tasks are admitted to a [`Timer`] with a delay; rather than parking an
//! OS timer per task, the timer buckets tasks into a chain of wheels (one
//! [`Spoke`](crate::spoke::Spoke) per bucket) and a single pump thread
//! advances the wheel and fires due buckets, cascading far-future tasks
//! down from coarser wheels as the clock catches up to them. This gives
//! O(1) amortized insertion and cancellation regardless of how many tasks
//! are outstanding, at the cost of only millisecond-scale precision (the
//! configured tick span).
//!
//! ```no_run
//! use std::sync::Arc;
//! use wheel_timer::{Options, Timer};
//!
//! let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
//! timer.start();
//!
//! let task = timer.after_fn(250, || println!("fired")).unwrap();
//! assert!(task.activated());
//! # timer.stop();
//! ```
//!
//! A process-wide default timer, started on first use, is available under
//! [`default`] for callers who don't need an isolated instance.

mod clock;
mod default;
mod delay_queue;
mod entry;
mod error;
mod executor;
mod heap;
mod job;
mod spoke;
mod task;
mod timer;
mod wheel;

pub use clock::{Clock, ClockSource, SystemClock};
pub use error::Closed;
pub use executor::{Executor, ThreadPerTaskExecutor};
pub use job::{Job, JobFn};
pub use task::Task;
pub use timer::{Options, Timer};

pub use default as process;
