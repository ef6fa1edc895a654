// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Internal synchronization helpers: a [`Mutex`]-[`Condvar`] pair and a
//! lifetime-erased unit of work.

use std::sync::{Condvar, Mutex, MutexGuard};

/// An ergonomic wrapper around a [`Mutex`]-[`Condvar`] pair.
pub(crate) struct Status<T> {
    mutex: Mutex<T>,
    condvar: Condvar,
}

impl<T> Status<T> {
    /// Creates a new status initialized with the given value.
    pub(crate) fn new(t: T) -> Self {
        Self {
            mutex: Mutex::new(t),
            condvar: Condvar::new(),
        }
    }

    /// Runs `f` on the status under the lock, then notifies one waiting
    /// thread.
    pub(crate) fn update_notify_one<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.mutex.lock().unwrap();
        let result = f(&mut guard);
        drop(guard);
        self.condvar.notify_one();
        result
    }

    /// Runs `f` on the status under the lock, then notifies all waiting
    /// threads.
    pub(crate) fn update_notify_all<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.mutex.lock().unwrap();
        let result = f(&mut guard);
        drop(guard);
        self.condvar.notify_all();
        result
    }

    /// Waits until the predicate is false on this status.
    ///
    /// This returns a [`MutexGuard`], allowing to further inspect or modify the
    /// status.
    pub(crate) fn wait_while(&self, predicate: impl FnMut(&mut T) -> bool) -> MutexGuard<T> {
        self.condvar
            .wait_while(self.mutex.lock().unwrap(), predicate)
            .unwrap()
    }
}

/// A unit of work submitted to an [`Executor`](crate::Executor).
///
/// A job is a boxed closure whose borrows have been erased to `'static` so
/// that it can cross into long-lived worker threads.
pub(crate) struct Job(Box<dyn FnOnce() + Send + 'static>);

impl Job {
    /// Creates a job from a closure that owns all of its state.
    #[cfg(test)]
    pub(crate) fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Creates a job from a closure borrowing non-`'static` state.
    ///
    /// # Safety
    ///
    /// Everything the closure borrows must remain valid and not be mutated
    /// until the job has either run to completion or been dropped by the
    /// executor. The batch runner upholds this by blocking on a completion
    /// barrier that every job releases exactly once, whether it runs or is
    /// dropped unrun.
    pub(crate) unsafe fn erased<'a>(f: Box<dyn FnOnce() + Send + 'a>) -> Self {
        // SAFETY: only the lifetime is transmuted; the pointer and vtable
        // layouts of the two trait-object types are identical. Validity of
        // the borrows past this point is the caller's obligation, per this
        // function's contract.
        Self(unsafe {
            std::mem::transmute::<Box<dyn FnOnce() + Send + 'a>, Box<dyn FnOnce() + Send + 'static>>(
                f,
            )
        })
    }

    /// Runs the job, consuming it.
    pub(crate) fn run(self) {
        (self.0)()
    }
}
