// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The node that actually lives inside a [`crate::spoke::Spoke`]'s intrusive
//! list, grounded on `task_entry.go`/`spoke.go` and on the `Linked` impl in
//! `kasync`'s `time/timer/entry.rs`.
//!
//! Unlike `kasync`'s `Entry`, which is pinned on the stack inside a `Future`
//! and needs `Pin`/`PhantomPinned` to stay put while linked, ours is always
//! heap-allocated behind an `Arc` and never moved after construction, so no
//! pinning is required. Using `Arc<Entry>` as the `Linked::Handle` (rather
//! than `NonNull<Entry>`, as `kasync` uses) also sidesteps manual free'ing:
//! the original Go `taskEntry` relies on the garbage collector to reclaim a
//! node once nothing points at it any more (neither a spoke's list nor
//! `task.entry`); `Arc`'s refcount gives us the same "freed once
//! unreachable from anywhere" property without a GC.

use std::mem::offset_of;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use cordyceps::{list, Linked};

use crate::spoke::Spoke;
use crate::task::Task;

/// A single task's membership in the wheel at a frozen expiration time.
///
/// `expiration_ms` never changes once an `Entry` is created; the original
/// Go `taskEntry` works the same way (`newTaskEntry` fixes `expirationMs`
/// once, computed from `task.delay` at admission time). Rescheduling a task
/// (`Task::set_delay` while already activated, or a fresh `add_task` after
/// the task fired) always creates a brand new `Entry`, it never mutates an
/// existing one in place.
pub(crate) struct Entry {
    links: list::Links<Entry>,
    /// The spoke that currently holds this entry in its list, or null if the
    /// entry is not linked into any spoke right now. Mirrors `taskEntry.list
    /// atomic.Pointer[Spoke]` in `task_entry.go`.
    ///
    /// Safety invariant: whenever this is non-null, it points at a `Spoke`
    /// that is kept alive by some `Wheel`'s `spokes` array for at least as
    /// long as the `Timer` lives, because every `Wheel` in the overflow
    /// chain is itself kept alive by an `Arc` for the `Timer`'s entire
    /// lifetime. Dereferencing it through `Entry::owner` is therefore sound
    /// for as long as the owning `Timer` exists.
    owner: AtomicPtr<Spoke>,
    pub(crate) expiration_ms: i64,
    task: Arc<Task>,
}

impl Entry {
    pub(crate) fn new(expiration_ms: i64, task: Arc<Task>) -> Arc<Entry> {
        Arc::new(Self {
            links: list::Links::new(),
            owner: AtomicPtr::new(std::ptr::null_mut()),
            expiration_ms,
            task,
        })
    }

    pub(crate) fn owner(&self) -> Option<NonNull<Spoke>> {
        NonNull::new(self.owner.load(Ordering::Acquire))
    }

    pub(crate) fn set_owner(&self, spoke: Option<NonNull<Spoke>>) {
        let raw = spoke.map_or(std::ptr::null_mut(), NonNull::as_ptr);
        self.owner.store(raw, Ordering::Release);
    }

    pub(crate) fn clear_owner(&self) {
        self.set_owner(None);
    }

    pub(crate) fn task(&self) -> Arc<Task> {
        Arc::clone(&self.task)
    }

    /// True once `task` has moved on to a different entry (or none at all),
    /// i.e. this entry is stale and should be dropped wherever it surfaces.
    /// Mirrors `taskEntry.cancelled()`'s `te.task.getTaskEntry() != te`.
    pub(crate) fn is_cancelled(self: &Arc<Self>) -> bool {
        !self.task.owns_entry(self)
    }

    /// Detaches this entry from whichever spoke currently owns it, retrying
    /// until the owner is observed null. Mirrors `taskEntry.remove()`'s
    /// retry loop in `task_entry.go`: between reading the owner and calling
    /// `Spoke::remove`, another thread may have already migrated the entry
    /// to a different spoke (or removed it outright), so a single attempt
    /// is not enough.
    pub(crate) fn remove_self(this: &Arc<Entry>) {
        loop {
            let Some(owner) = this.owner() else {
                return;
            };
            // Safety: see the `owner` field's invariant above.
            let spoke = unsafe { owner.as_ref() };
            if spoke.remove(this).is_some() {
                return;
            }
        }
    }
}

// Safety: `links` is only ever accessed through the list that currently
// owns this entry, which holds the spoke's `Mutex` while doing so.
unsafe impl Linked<list::Links<Entry>> for Entry {
    type Handle = Arc<Entry>;

    fn into_ptr(handle: Arc<Entry>) -> NonNull<Entry> {
        // Safety: `Arc::into_raw` never returns null.
        unsafe { NonNull::new_unchecked(Arc::into_raw(handle).cast_mut()) }
    }

    unsafe fn from_ptr(ptr: NonNull<Entry>) -> Arc<Entry> {
        unsafe { Arc::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Entry>) -> NonNull<list::Links<Entry>> {
        ptr.map_addr(|addr| addr.checked_add(offset_of!(Entry, links)).unwrap())
            .cast()
    }
}
