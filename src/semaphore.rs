// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Counted semaphore: the blocking primitive underneath `Waiter`. `wait`
// decrements the count and parks the calling thread only when the count
// goes negative; `signal` increments it and wakes one parked thread when
// the count had been negative. This is the only place in the crate a
// thread actually suspends — channels hold only `SpinLock`s otherwise.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

type Continuation = Box<dyn FnOnce() + Send>;

pub(crate) struct Semaphore {
    count: Mutex<i64>,
    cond: Condvar,
    pending: Mutex<VecDeque<Continuation>>,
}

impl Semaphore {
    pub(crate) fn new() -> Self {
        Self {
            count: Mutex::new(0),
            cond: Condvar::new(),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Decrement the count. Blocks until a matching `signal()` if the
    /// post-decrement value is negative. Spurious wakes are tolerated by
    /// rechecking the value in a loop.
    pub(crate) fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        *count -= 1;
        while *count < 0 {
            count = self.cond.wait(count).unwrap();
        }
    }

    /// Increment the count. If the pre-increment value was negative,
    /// either dispatches a queued `notify()` continuation on a freshly
    /// spawned thread, or — if none is queued — wakes one `wait()`-parked
    /// thread. The count is shared between `wait` and `notify` clients,
    /// so at most one of the two is woken per `signal()`.
    pub(crate) fn signal(&self) {
        let mut count = self.count.lock().unwrap();
        let was_negative = *count < 0;
        *count += 1;
        drop(count);
        if !was_negative {
            return;
        }
        if let Some(cont) = self.pending.lock().unwrap().pop_front() {
            std::thread::spawn(cont);
        } else {
            self.cond.notify_one();
        }
    }

    /// Decrement the count; if the result is non-negative, run `cont`
    /// inline and return. Otherwise the continuation is queued and will be
    /// dispatched on a freshly spawned thread by a later `signal()` that
    /// observes a negative pre-increment count.
    #[allow(dead_code)]
    pub(crate) fn notify<F>(&self, cont: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut count = self.count.lock().unwrap();
        *count -= 1;
        if *count >= 0 {
            drop(count);
            cont();
            return;
        }
        drop(count);
        self.pending.lock().unwrap().push_back(Box::new(cont));
    }

    /// Reset the count to zero and drop any queued continuations. Used
    /// only by the waiter pool when recycling a waiter: a waiter must
    /// never be handed back out with a lingering debt from a wait that
    /// never got its matching signal.
    pub(crate) fn drain(&self) {
        let mut count = self.count.lock().unwrap();
        *count = 0;
        self.pending.lock().unwrap().clear();
    }

    #[cfg(test)]
    pub(crate) fn value(&self) -> i64 {
        *self.count.lock().unwrap()
    }
}
