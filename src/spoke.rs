// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A single bucket in a [`crate::wheel::Wheel`], grounded on `spoke.go`.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use cordyceps::List;

use crate::entry::Entry;

/// One slot of a wheel: an intrusive list of entries sharing (approximately)
/// the same expiration, plus the virtual deadline that list currently
/// represents.
///
/// `expiration_ms` doubles as "is this spoke currently scheduled in the
/// delay queue at all" (`-1` means "empty, not scheduled"), exactly as
/// `spoke.go`'s `expirationMs atomic.Int64` initialized to `-1` does.
pub(crate) struct Spoke {
    list: Mutex<List<Entry>>,
    expiration_ms: AtomicI64,
    task_counter: Arc<AtomicI64>,
}

impl Spoke {
    pub(crate) fn new(task_counter: Arc<AtomicI64>) -> Self {
        Self {
            list: Mutex::new(List::new()),
            expiration_ms: AtomicI64::new(-1),
            task_counter,
        }
    }

    pub(crate) fn expiration_ms(&self) -> i64 {
        self.expiration_ms.load(Ordering::Acquire)
    }

    /// Updates the spoke's virtual deadline, returning `true` if it changed.
    /// A fresh `Spoke::add` calling this with the same virtual deadline the
    /// spoke already represents (the common case: more tasks landing in an
    /// already-scheduled bucket) must not re-enqueue the spoke into the
    /// delay queue a second time. Mirrors `spoke.go`'s
    /// `SetExpiration`.
    pub(crate) fn set_expiration(&self, expiration_ms: i64) -> bool {
        self.expiration_ms.swap(expiration_ms, Ordering::AcqRel) != expiration_ms
    }

    fn as_non_null(&self) -> NonNull<Spoke> {
        NonNull::from(self)
    }

    /// Links `entry` into this spoke, first detaching it from wherever it
    /// currently lives. Retries if another thread relinks the entry out from
    /// under us between the detach and taking our lock — mirrors the retry
    /// loop `spoke.go`'s `Add` relies on via `taskEntry.remove`.
    pub(crate) fn add(&self, entry: Arc<Entry>) {
        loop {
            Entry::remove_self(&entry);
            let mut list = self.list.lock().unwrap();
            if entry.owner().is_some() {
                // raced with another thread re-linking this entry elsewhere
                // after our detach above; retry from scratch.
                continue;
            }
            entry.set_owner(Some(self.as_non_null()));
            list.push_front(entry);
            self.task_counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }

    /// Removes `entry` from this spoke's list, but only if this spoke still
    /// owns it. Returns the reclaimed handle on success. Mirrors `spoke.go`'s
    /// `Remove`, which re-checks `te.list.Load() == sp` under its own lock
    /// before unlinking.
    pub(crate) fn remove(&self, entry: &Arc<Entry>) -> Option<Arc<Entry>> {
        let mut list = self.list.lock().unwrap();
        if entry.owner() != Some(self.as_non_null()) {
            return None;
        }
        let ptr = NonNull::from(Arc::as_ref(entry));
        let removed = unsafe { list.remove(ptr) };
        if removed.is_some() {
            entry.clear_owner();
            self.task_counter.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drains every entry currently in this spoke, resetting its expiration
    /// to "empty", and invokes `f` for each. Mirrors `spoke.go`'s `Flush`,
    /// which the timing wheel's cascade uses to re-evaluate every entry in
    /// an expired bucket (either firing it or demoting it to a finer-grained
    /// wheel).
    pub(crate) fn flush(&self, mut f: impl FnMut(Arc<Entry>)) {
        let drained = {
            let mut list = self.list.lock().unwrap();
            let drained = list.split_off(0);
            self.expiration_ms.store(-1, Ordering::Release);
            drained
        };
        let mut count: i64 = 0;
        for entry in drained {
            entry.clear_owner();
            count += 1;
            f(entry);
        }
        if count > 0 {
            self.task_counter.fetch_sub(count, Ordering::Relaxed);
        }
    }
}
