// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use fastrand::Rng;
use wheel_timer::{Options, Task, Timer};

fn insert_1k_tasks(c: &mut Criterion) {
    c.bench_function("insert_1k_tasks", |b| {
        b.iter_batched(
            || {
                let timer = Timer::new(Options::new().tick_ms(1).wheel_size(512));
                timer.start();
                timer
            },
            |timer| {
                let rng = Rng::with_seed(0);
                for _ in 0..1_000 {
                    let delay = rng.i64(0..5_000);
                    let _ = timer.after_fn(delay, || {});
                }
                timer.stop();
            },
            BatchSize::SmallInput,
        );
    });
}

fn cancel_1k_tasks(c: &mut Criterion) {
    c.bench_function("cancel_1k_tasks", |b| {
        b.iter_batched(
            || {
                let timer = Timer::new(Options::new().tick_ms(1).wheel_size(512));
                timer.start();
                let tasks: Vec<_> = (0..1_000)
                    .map(|_| {
                        let task = Task::with_fn(60_000, || {});
                        timer.add_task(Arc::clone(&task)).unwrap();
                        task
                    })
                    .collect();
                (timer, tasks)
            },
            |(timer, tasks)| {
                for task in &tasks {
                    task.cancel();
                }
                timer.stop();
            },
            BatchSize::SmallInput,
        );
    });
}

fn advance_through_cascade(c: &mut Criterion) {
    c.bench_function("advance_through_cascade", |b| {
        b.iter_batched(
            || {
                let timer = Timer::new(Options::new().tick_ms(1).wheel_size(8));
                timer.start();
                let fired = Arc::new(AtomicUsize::new(0));
                for i in 0..1_000 {
                    let fired = Arc::clone(&fired);
                    let _ = timer.after_fn(i % 500, move || {
                        fired.fetch_add(1, Ordering::Relaxed);
                    });
                }
                (timer, fired)
            },
            |(timer, fired)| {
                while fired.load(Ordering::Relaxed) < 1_000 {
                    std::thread::sleep(std::time::Duration::from_micros(50));
                }
                timer.stop();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    wheel,
    insert_1k_tasks,
    cancel_1k_tasks,
    advance_through_cascade,
);
criterion_main!(wheel);
