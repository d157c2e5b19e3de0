// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// FIFO queue of pending waiters, one per channel side (senders,
// receivers). Always accessed while the owning channel's spinlock is
// held, so a plain `VecDeque` suffices in place of the intrusive
// head/tail-pointer list a lock-free context would need.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::waiter::Waiter;

/// Anything that can be located in a [`WaiterQueue`] by the waiter it
/// wraps, so `remove` can scan-and-cancel a specific entry mid-select.
pub(crate) trait HasWaiter<T> {
    fn waiter(&self) -> &Arc<Waiter<T>>;
}

impl<T> HasWaiter<T> for Arc<Waiter<T>> {
    fn waiter(&self) -> &Arc<Waiter<T>> {
        self
    }
}

/// A parked receiver. `operation_id` is meaningful only when this entry
/// came from a `select()` call (it is the index of the arm within that
/// call); plain blocking receives stash `0` and never read it back.
pub(crate) struct RecvItem<T> {
    pub(crate) waiter: Arc<Waiter<T>>,
    pub(crate) operation_id: usize,
}

impl<T> HasWaiter<T> for RecvItem<T> {
    fn waiter(&self) -> &Arc<Waiter<T>> {
        &self.waiter
    }
}

/// A parked sender. The outgoing value lives in its own cell rather than
/// in the waiter's payload slot: a single `select()` call may register
/// more than one `Send` arm sharing no single waiter's payload could hold
/// without one arm's value clobbering another's before either commits.
pub(crate) struct SendItem<T> {
    pub(crate) waiter: Arc<Waiter<T>>,
    pub(crate) operation_id: usize,
    pub(crate) value: Arc<Mutex<Option<T>>>,
}

impl<T> SendItem<T> {
    pub(crate) fn new(waiter: Arc<Waiter<T>>, operation_id: usize, value: T) -> Self {
        Self {
            waiter,
            operation_id,
            value: Arc::new(Mutex::new(Some(value))),
        }
    }
}

impl<T> HasWaiter<T> for SendItem<T> {
    fn waiter(&self) -> &Arc<Waiter<T>> {
        &self.waiter
    }
}

pub(crate) struct WaiterQueue<Item> {
    items: VecDeque<Item>,
}

impl<Item> WaiterQueue<Item> {
    pub(crate) const fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub(crate) fn push_back(&mut self, item: Item) {
        self.items.push_back(item);
    }

    /// Re-register an entry at the front — used when a caller must
    /// re-enter the queue after an interrupted wait, so it does not lose
    /// its place to callers that arrived after it.
    pub(crate) fn push_front(&mut self, item: Item) {
        self.items.push_front(item);
    }

    pub(crate) fn pop_front(&mut self) -> Option<Item> {
        self.items.pop_front()
    }

    pub(crate) fn peek_front(&self) -> Option<&Item> {
        self.items.front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T, Item: HasWaiter<T>> WaiterQueue<Item> {
    /// O(n) scan-and-remove, used to cancel a waiter mid-select when the
    /// coordinator deregisters from every channel but the one that won.
    pub(crate) fn remove(&mut self, w: &Arc<Waiter<T>>) -> bool {
        if let Some(pos) = self.items.iter().position(|x| Arc::ptr_eq(x.waiter(), w)) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }
}
