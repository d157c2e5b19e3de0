// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Lock-free LIFO stack recycling `Waiter`s. Amortizes the allocation
// churn of obtaining a fresh `Arc<Waiter<T>>` on every blocking send or
// receive. Capped at a small constant; waiters released beyond the cap
// are simply dropped.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::spin_lock::adaptive_yield_pub;
use crate::waiter::Waiter;

/// Small per-type cap: beyond this, a released waiter is deallocated
/// rather than pooled.
const POOL_CAP: usize = 256;

struct Node<T> {
    waiter: Arc<Waiter<T>>,
    next: *mut Node<T>,
}

pub(crate) struct WaiterPool<T> {
    head: AtomicPtr<Node<T>>,
    len: AtomicUsize,
}

impl<T> WaiterPool<T> {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
        }
    }

    /// Pop a waiter from the pool, or construct a fresh one if empty
    /// (`PoolExhaustedTransient` falls back to a plain allocation, never
    /// to an error).
    pub(crate) fn obtain(&self) -> Arc<Waiter<T>> {
        let mut k = 0u32;
        loop {
            let head = self.head.load(Ordering::Acquire);
            if head.is_null() {
                return Arc::new(Waiter::new());
            }
            let next = unsafe { (*head).next };
            if self
                .head
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Relaxed);
                let node = unsafe { Box::from_raw(head) };
                return node.waiter;
            }
            adaptive_yield_pub(&mut k);
        }
    }

    /// Validate, drain, and push `waiter` back onto the stack. Beyond
    /// `POOL_CAP` entries, the waiter (and its semaphore) is simply
    /// dropped instead.
    pub(crate) fn release(&self, waiter: Arc<Waiter<T>>) {
        waiter.validate_for_release();
        waiter.drain_and_make_ready();

        if self.len.load(Ordering::Relaxed) >= POOL_CAP {
            return;
        }

        let node = Box::into_raw(Box::new(Node {
            waiter,
            next: ptr::null_mut(),
        }));
        let mut k = 0u32;
        loop {
            let head = self.head.load(Ordering::Acquire);
            unsafe {
                (*node).next = head;
            }
            if self
                .head
                .compare_exchange_weak(head, node, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.len.fetch_add(1, Ordering::Relaxed);
                return;
            }
            adaptive_yield_pub(&mut k);
        }
    }
}

impl<T> Drop for WaiterPool<T> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        while !head.is_null() {
            let node = unsafe { Box::from_raw(head) };
            head = node.next;
        }
    }
}

// Safety: the stack is only ever touched through the atomic head pointer;
// `Node<T>` ownership moves exactly once between `Box::into_raw` and
// `Box::from_raw` per push/pop, so there's no concurrent access to `*mut
// Node<T>` contents outside of that single-consumer handoff.
unsafe impl<T: Send> Send for WaiterPool<T> {}
unsafe impl<T: Send> Sync for WaiterPool<T> {}
