// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end scenarios against the public [`Timer`] facade, scaled down
//! from the literal values in spec.md §8 to keep the suite fast while still
//! exercising the same code paths: same-tick batching, overflow-wheel
//! cascade, cancellation racing dispatch, in-callback repetition, and
//! stop/restart catch-up.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use wheel_timer::{Options, Task, Timer};

fn sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

/// Installs a `tracing` subscriber for the duration of one test, scoped to
/// the calling thread so concurrent tests don't fight over the global
/// default. `RUST_LOG` controls verbosity, same as everywhere else in the
/// teacher's test suites.
fn trace() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_thread_ids(true)
        .set_default()
}

#[test]
fn many_tasks_fire_within_tolerance_and_counter_returns_to_zero() {
    let _trace = trace();
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    let fired = Arc::new(AtomicUsize::new(0));
    for delay in 0..200i64 {
        let fired = Arc::clone(&fired);
        timer.after_fn(delay, move || {
            fired.fetch_add(1, Ordering::SeqCst);
        }).unwrap();
    }

    sleep_ms(250);
    assert_eq!(fired.load(Ordering::SeqCst), 200);
    assert_eq!(timer.task_counter(), 0);
    timer.stop();
}

#[test]
fn far_future_task_overflows_and_fires_in_order() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    let order = Arc::new(Mutex::new(Vec::new()));
    let order_a = Arc::clone(&order);
    let order_b = Arc::clone(&order);

    // comfortably beyond the 32ms base interval, forcing an overflow wheel
    timer.after_fn(300, move || order_a.lock().unwrap().push("far")).unwrap();
    timer.after_fn(100, move || order_b.lock().unwrap().push("near")).unwrap();

    sleep_ms(400);
    assert_eq!(*order.lock().unwrap(), vec!["near", "far"]);
    assert_eq!(timer.task_counter(), 0);
    timer.stop();
}

#[test]
fn cancelling_before_expiry_suppresses_dispatch() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = Arc::clone(&ran);
    let task = timer.after_fn(150, move || {
        ran_clone.fetch_add(1, Ordering::SeqCst);
    }).unwrap();

    sleep_ms(30);
    task.cancel();
    sleep_ms(200);

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(timer.task_counter(), 0);
    timer.stop();
}

#[test]
fn cancel_then_re_add_reactivates_the_same_task_handle() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = Arc::clone(&ran);
    let task = Task::new(1_000).with_job_fn(move || {
        ran_clone.fetch_add(1, Ordering::SeqCst);
    });

    timer.add_task(Arc::clone(&task)).unwrap();
    task.cancel();
    assert!(!task.activated());

    task.set_delay(20);
    timer.add_task(Arc::clone(&task)).unwrap();
    assert!(task.activated());

    sleep_ms(100);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    timer.stop();
}

#[test]
fn re_adding_an_already_scheduled_task_moves_its_expiry() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    let ran_at = Arc::new(AtomicI64::new(-1));
    let ran_at_clone = Arc::clone(&ran_at);
    let task = Task::new(1_000).with_job_fn(move || {
        ran_at_clone.store(1, Ordering::SeqCst);
    });
    timer.add_task(Arc::clone(&task)).unwrap();
    assert!(task.activated());

    // re-add before the first binding ever fires: the old entry is
    // detached and superseded, so only the new expiry governs dispatch.
    task.set_delay(30);
    timer.add_task(Arc::clone(&task)).unwrap();

    sleep_ms(150);
    assert_eq!(ran_at.load(Ordering::SeqCst), 1);
    assert_eq!(timer.task_counter(), 0);
    timer.stop();
}

#[test]
fn task_reschedules_itself_from_inside_its_own_job() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    let count = Arc::new(AtomicUsize::new(0));
    let task = Task::new(10);
    let task_for_job = Arc::clone(&task);
    let timer_for_job = Arc::clone(&timer);
    let count_for_job = Arc::clone(&count);
    task.clone().with_job_fn(move || {
        let n = count_for_job.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 5 {
            task_for_job.set_delay(10);
            let _ = timer_for_job.add_task(Arc::clone(&task_for_job));
        }
    });

    timer.add_task(Arc::clone(&task)).unwrap();
    sleep_ms(300);

    assert_eq!(count.load(Ordering::SeqCst), 5);
    timer.stop();
}

#[test]
fn stopping_and_restarting_delivers_tasks_due_during_the_pause() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let fired = Arc::clone(&fired);
        timer.after_fn(10, move || {
            fired.fetch_add(1, Ordering::SeqCst);
        }).unwrap();
    }

    timer.stop();
    assert!(!timer.started());
    sleep_ms(100); // all 20 tasks become "due" while the pump is stopped

    timer.start();
    sleep_ms(100);

    assert_eq!(fired.load(Ordering::SeqCst), 20);
    assert_eq!(timer.task_counter(), 0);
    timer.stop();
}

#[test]
fn add_task_after_stop_is_rejected() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();
    timer.stop();

    let result = timer.after_fn(10, || {});
    assert!(result.is_err());
}

#[test]
fn wheel_size_is_coerced_up_to_next_power_of_two() {
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(100));
    assert_eq!(timer.wheel_size(), 128);
    assert_eq!(timer.wheel_mask(), 127);
}

#[test]
#[should_panic(expected = "tick must be")]
fn zero_tick_panics_at_construction() {
    let _ = Timer::new(Options::new().tick_ms(0));
}

#[test]
#[should_panic(expected = "wheel size must be")]
fn zero_wheel_size_panics_at_construction() {
    let _ = Timer::new(Options::new().wheel_size(0));
}

#[test]
fn concurrent_producers_each_fire_exactly_once() {
    let _trace = trace();
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(64));
    timer.start();

    let fired = Arc::new(AtomicUsize::new(0));
    let producers = 8;
    let per_producer = 200;
    let handles: Vec<_> = (0..producers)
        .map(|seed| {
            let timer = Arc::clone(&timer);
            let fired = Arc::clone(&fired);
            std::thread::spawn(move || {
                let rng = fastrand::Rng::with_seed(seed as u64);
                for _ in 0..per_producer {
                    let fired = Arc::clone(&fired);
                    let delay = rng.i64(0..500);
                    timer
                        .after_fn(delay, move || {
                            fired.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    sleep_ms(800);
    assert_eq!(fired.load(Ordering::SeqCst), producers * per_producer);
    assert_eq!(timer.task_counter(), 0);
    timer.stop();
}

#[test]
fn panicking_job_does_not_poison_the_pump() {
    let _trace = trace();
    let timer = Timer::new(Options::new().tick_ms(1).wheel_size(32));
    timer.start();

    timer.after_fn(10, || panic!("boom")).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = Arc::clone(&ran);
    timer.after_fn(50, move || {
        ran_clone.fetch_add(1, Ordering::SeqCst);
    }).unwrap();

    sleep_ms(150);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    timer.stop();
}
