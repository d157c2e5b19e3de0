// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Lock-free spin lock with adaptive backoff: busy-spin -> pause -> yield -> sleep.
// Every channel's mutable state (ring cursors, waiter queues, closed flag) is
// guarded by one of these; critical sections must stay short and branch-free
// and must never be held across a blocking `Semaphore::wait`.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

/// Adaptive backoff: busy spin, then a CPU pause hint, then yield, then sleep.
///
/// - k < 4:  busy spin (do nothing)
/// - k < 16: CPU pause hint
/// - k < 32: thread yield
/// - k >= 32: sleep 1ms
#[inline]
fn adaptive_yield(k: &mut u32) {
    if *k < 4 {
        // busy spin
    } else if *k < 16 {
        std::hint::spin_loop();
    } else if *k < 32 {
        std::thread::yield_now();
    } else {
        std::thread::sleep(std::time::Duration::from_millis(1));
        return;
    }
    *k += 1;
}

/// Public (crate-internal) access to the adaptive yield for other modules.
#[inline]
pub(crate) fn adaptive_yield_pub(k: &mut u32) {
    adaptive_yield(k);
}

/// A simple spin lock with adaptive backoff.
///
/// Uses an `AtomicU32` exchanged to 1 on lock, stored to 0 on unlock, with
/// adaptive yield between retries.
pub struct SpinLock {
    lc: AtomicU32,
}

impl SpinLock {
    /// Create a new unlocked spin lock.
    pub const fn new() -> Self {
        Self {
            lc: AtomicU32::new(0),
        }
    }

    /// Acquire the lock (spinning with adaptive backoff).
    pub fn lock(&self) {
        let mut k = 0u32;
        while self.lc.swap(1, Ordering::Acquire) != 0 {
            adaptive_yield(&mut k);
        }
    }

    /// Release the lock.
    pub fn unlock(&self) {
        self.lc.store(0, Ordering::Release);
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// Safety: SpinLock is designed for concurrent access.
unsafe impl Send for SpinLock {}
unsafe impl Sync for SpinLock {}

/// `T` behind a [`SpinLock`], with a RAII guard. This is what channel
/// internals (ring cursors, closed flag, pending-waiter queues) are stored
/// in: the guard's `Drop` releases the lock, so a critical section ends
/// exactly where the borrow does and can never be forgotten across a
/// `Semaphore::wait`.
pub(crate) struct Locked<T> {
    lock: SpinLock,
    data: UnsafeCell<T>,
}

impl<T> Locked<T> {
    pub(crate) const fn new(data: T) -> Self {
        Self {
            lock: SpinLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub(crate) fn lock(&self) -> LockedGuard<'_, T> {
        self.lock.lock();
        LockedGuard { parent: self }
    }
}

// Safety: access to `data` is serialized by `lock`.
unsafe impl<T: Send> Sync for Locked<T> {}

pub(crate) struct LockedGuard<'a, T> {
    parent: &'a Locked<T>,
}

impl<T> Deref for LockedGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.parent.data.get() }
    }
}

impl<T> DerefMut for LockedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.parent.data.get() }
    }
}

impl<T> Drop for LockedGuard<'_, T> {
    fn drop(&mut self) {
        self.parent.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn basic_lock_unlock() {
        let lock = SpinLock::new();
        lock.lock();
        lock.unlock();
    }

    #[test]
    fn critical_section() {
        let lock = Arc::new(SpinLock::new());
        let counter = Arc::new(AtomicI32::new(0));
        let iterations = 1000;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..iterations {
                        lock.lock();
                        counter.fetch_add(1, Ordering::Relaxed);
                        lock.unlock();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 4 * iterations);
    }

    #[test]
    fn locked_guard_mutates_in_place() {
        let locked = Locked::new(0i32);
        {
            let mut g = locked.lock();
            *g += 1;
        }
        assert_eq!(*locked.lock(), 1);
    }

    #[test]
    fn locked_guard_contention() {
        let locked = Arc::new(Locked::new(0i64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locked = Arc::clone(&locked);
                thread::spawn(move || {
                    for _ in 0..500 {
                        *locked.lock() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*locked.lock(), 2000);
    }
}
