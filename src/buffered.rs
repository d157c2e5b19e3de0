// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A bounded, ring-backed FIFO channel. Both `send` and `receive` unify
// their plain blocking path with select's: a blocked caller parks a
// waiter in `WaitSelect` and the opposite side's operation claims it with
// the same CAS a multi-way `select()` would use, so there is exactly one
// commit protocol in the whole crate rather than a special-cased one for
// plain operations.

use std::sync::Arc;

use crate::queue::{RecvItem, SendItem, WaiterQueue};
use crate::ring::Ring;
use crate::select::{Selectable, Selection};
use crate::spin_lock::Locked;
use crate::waiter::{State, Waiter};
use crate::waiter_pool::WaiterPool;

struct Inner<T> {
    ring: Ring<T>,
    capacity: usize,
    head: u64,
    tail: u64,
    len: usize,
    closed: bool,
    send_waiters: WaiterQueue<SendItem<T>>,
    recv_waiters: WaiterQueue<RecvItem<T>>,
}

pub(crate) struct BufferedChannel<T> {
    inner: Locked<Inner<T>>,
    pool: WaiterPool<T>,
}

impl<T> BufferedChannel<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffered channel capacity must be non-zero");
        Self {
            inner: Locked::new(Inner {
                ring: Ring::with_capacity(capacity),
                capacity,
                head: 0,
                tail: 0,
                len: 0,
                closed: false,
                send_waiters: WaiterQueue::new(),
                recv_waiters: WaiterQueue::new(),
            }),
            pool: WaiterPool::new(),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Blocking send. Returns `false` if the channel was already (or
    /// becomes, while parked) closed before the value was accepted.
    pub(crate) fn send(&self, value: T) -> bool {
        let mut guard = self.inner.lock();
        if guard.closed {
            return false;
        }
        if guard.len < guard.capacity {
            push_value(&mut guard, value);
            wake_one_receiver(&mut guard);
            return true;
        }

        let waiter = self.pool.obtain();
        assert!(waiter.set_state(State::Ready, State::WaitSelect));
        let item = SendItem::new(Arc::clone(&waiter), 0, value);
        guard.send_waiters.push_back(item);
        drop(guard);

        waiter.wait();
        let delivered = match waiter.state() {
            State::Done => true,
            State::Invalidated => false,
            other => unreachable!("sender waiter woke in unexpected state {other:?}"),
        };
        self.pool.release(waiter);
        delivered
    }

    /// Blocking receive. Returns `None` once the channel is closed and
    /// drained.
    pub(crate) fn receive(&self) -> Option<T> {
        loop {
            let mut guard = self.inner.lock();
            if guard.len > 0 {
                let value = pop_value(&mut guard);
                wake_one_sender(&mut guard);
                return Some(value);
            }
            if guard.closed {
                return None;
            }

            let waiter = self.pool.obtain();
            assert!(waiter.set_state(State::Ready, State::WaitSelect));
            let item = RecvItem {
                waiter: Arc::clone(&waiter),
                operation_id: 0,
            };
            guard.recv_waiters.push_back(item);
            drop(guard);

            waiter.wait();
            match waiter.state() {
                State::Done => {
                    let value = waiter.take_pointer();
                    self.pool.release(waiter);
                    return value;
                }
                State::Invalidated => {
                    self.pool.release(waiter);
                    return None;
                }
                other => unreachable!("receiver waiter woke in unexpected state {other:?}"),
            }
        }
    }

    /// Marks the channel closed and wakes every parked waiter on both
    /// sides. Idempotent.
    pub(crate) fn close(&self) {
        let mut guard = self.inner.lock();
        if guard.closed {
            return;
        }
        guard.closed = true;
        let mut senders = Vec::new();
        while let Some(item) = guard.send_waiters.pop_front() {
            senders.push(item.waiter);
        }
        let mut receivers = Vec::new();
        while let Some(item) = guard.recv_waiters.pop_front() {
            receivers.push(item.waiter);
        }
        drop(guard);

        for w in senders.into_iter().chain(receivers.into_iter()) {
            if w.invalidate() {
                w.signal();
            }
        }
    }
}

impl<T> Drop for BufferedChannel<T> {
    /// Drop any values still buffered between `head` and `tail`. `Ring`
    /// stores its slots as `MaybeUninit<T>`, which drops nothing on its
    /// own, so without this any undelivered values would leak.
    fn drop(&mut self) {
        let guard = self.inner.lock();
        let mut idx = guard.head;
        while idx != guard.tail {
            unsafe {
                drop(guard.ring.read(idx));
            }
            idx = idx.wrapping_add(1);
        }
    }
}

/// Push `value` into the ring at the current tail. Caller must already
/// hold the lock and have verified `len < capacity`.
fn push_value<T>(guard: &mut Inner<T>, value: T) {
    let idx = guard.tail;
    unsafe {
        guard.ring.write(idx, value);
    }
    guard.tail = guard.tail.wrapping_add(1);
    guard.len += 1;
}

/// Pop the oldest value from the ring. Caller must already hold the lock
/// and have verified `len > 0`.
fn pop_value<T>(guard: &mut Inner<T>) -> T {
    let idx = guard.head;
    let value = unsafe { guard.ring.read(idx) };
    guard.head = guard.head.wrapping_add(1);
    guard.len -= 1;
    value
}

/// After a successful push, hand the oldest queued value straight to a
/// parked receiver if one is waiting, rather than leaving it for that
/// receiver to rediscover under a fresh lock acquisition.
fn wake_one_receiver<T>(guard: &mut Inner<T>) {
    while let Some(item) = guard.recv_waiters.pop_front() {
        if item.waiter.set_state(State::WaitSelect, State::Select) {
            let value = pop_value(guard);
            item.waiter
                .attach_selection(Selection {
                    operation_id: item.operation_id,
                });
            item.waiter.stash_payload(value);
            item.waiter.force_done();
            item.waiter.signal();
            return;
        }
        // Already invalidated by a racing close(); try the next one.
    }
}

/// After a pop frees a slot, hand that slot straight to a parked sender
/// if one is waiting.
fn wake_one_sender<T>(guard: &mut Inner<T>) {
    while let Some(item) = guard.send_waiters.pop_front() {
        if item.waiter.set_state(State::WaitSelect, State::Select) {
            let value = item
                .value
                .lock()
                .unwrap()
                .take()
                .expect("claimed sender missing its value");
            push_value(guard, value);
            item.waiter.attach_selection(Selection {
                operation_id: item.operation_id,
            });
            item.waiter.force_done();
            item.waiter.signal();
            return;
        }
    }
}

impl<T> Selectable<T> for BufferedChannel<T> {
    fn try_select_send(&self, value: T) -> Result<(), T> {
        let mut guard = self.inner.lock();
        if guard.closed {
            return Err(value);
        }
        if guard.len < guard.capacity {
            push_value(&mut guard, value);
            wake_one_receiver(&mut guard);
            Ok(())
        } else {
            Err(value)
        }
    }

    fn try_select_receive(&self) -> Option<T> {
        let mut guard = self.inner.lock();
        if guard.len > 0 {
            let value = pop_value(&mut guard);
            wake_one_sender(&mut guard);
            Some(value)
        } else {
            None
        }
    }

    fn register_select_send(&self, waiter: Arc<Waiter<T>>, operation_id: usize, value: T) -> bool {
        let mut guard = self.inner.lock();
        if guard.closed {
            // Leave the arm unregistered rather than invalidating the
            // shared waiter: a select call may have other, still-open
            // arms that deserve a chance to commit.
            return false;
        }
        guard
            .send_waiters
            .push_back(SendItem::new(waiter, operation_id, value));
        true
    }

    fn register_select_receive(&self, waiter: Arc<Waiter<T>>, operation_id: usize) -> bool {
        let mut guard = self.inner.lock();
        if guard.closed {
            return false;
        }
        guard.recv_waiters.push_back(RecvItem {
            waiter,
            operation_id,
        });
        true
    }

    fn deregister_select_send(&self, waiter: &Arc<Waiter<T>>) {
        self.inner.lock().send_waiters.remove(waiter);
    }

    fn deregister_select_receive(&self, waiter: &Arc<Waiter<T>>) {
        self.inner.lock().recv_waiters.remove(waiter);
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
