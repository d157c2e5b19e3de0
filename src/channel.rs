// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The public channel handle. `Channel<T>` is a sealed enum over the two
// storage strategies so callers never need to know or name which one
// backs a given instance — `make_channel` picks it from the requested
// capacity, exactly as a `0`-capacity request picks an unbuffered
// (rendezvous) channel in the systems this crate's design is drawn from.

use std::sync::Arc;

use crate::buffered::BufferedChannel;
use crate::select::Selectable;
use crate::unbuffered::UnbufferedChannel;
use crate::waiter::Waiter;

enum Storage<T> {
    Buffered(BufferedChannel<T>),
    Unbuffered(UnbufferedChannel<T>),
}

/// A CSP-style channel of `T`. Construct with [`make_channel`]; share
/// between threads behind an `Arc`, the same way a `std::sync::mpsc`
/// sender or receiver is shared.
pub struct Channel<T> {
    storage: Storage<T>,
}

/// Build a channel. `capacity == 0` yields an unbuffered (rendezvous)
/// channel, where a send only completes once a receiver is waiting to
/// take it; any other capacity yields a ring-backed buffered channel that
/// can hold up to that many in-flight values before a sender blocks.
pub fn make_channel<T>(capacity: usize) -> Channel<T> {
    let storage = if capacity == 0 {
        Storage::Unbuffered(UnbufferedChannel::new())
    } else {
        Storage::Buffered(BufferedChannel::new(capacity))
    };
    Channel { storage }
}

impl<T> Channel<T> {
    /// Send `value`, blocking until it is accepted. Returns `false` if the
    /// channel was (or became, while waiting) closed before that happened;
    /// the value is dropped in that case.
    pub fn send(&self, value: T) -> bool {
        match &self.storage {
            Storage::Buffered(c) => c.send(value),
            Storage::Unbuffered(c) => c.send(value),
        }
    }

    /// Receive a value, blocking until one is available. Returns `None`
    /// once the channel is closed and, for a buffered channel, drained.
    pub fn receive(&self) -> Option<T> {
        match &self.storage {
            Storage::Buffered(c) => c.receive(),
            Storage::Unbuffered(c) => c.receive(),
        }
    }

    /// Close the channel, waking every waiting sender and receiver.
    /// Idempotent; further sends fail and further receives observe the
    /// remaining buffered values (if any) followed by `None`.
    pub fn close(&self) {
        match &self.storage {
            Storage::Buffered(c) => c.close(),
            Storage::Unbuffered(c) => c.close(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.storage {
            Storage::Buffered(c) => c.is_closed(),
            Storage::Unbuffered(c) => c.is_closed(),
        }
    }

    /// Drain the channel by repeatedly calling `f` on each received value
    /// until it closes.
    pub fn for_each<F: FnMut(T)>(&self, mut f: F) {
        while let Some(value) = self.receive() {
            f(value);
        }
    }
}

impl<T> Selectable<T> for Channel<T> {
    fn try_select_send(&self, value: T) -> Result<(), T> {
        match &self.storage {
            Storage::Buffered(c) => c.try_select_send(value),
            Storage::Unbuffered(c) => c.try_select_send(value),
        }
    }

    fn try_select_receive(&self) -> Option<T> {
        match &self.storage {
            Storage::Buffered(c) => c.try_select_receive(),
            Storage::Unbuffered(c) => c.try_select_receive(),
        }
    }

    fn register_select_send(&self, waiter: Arc<Waiter<T>>, operation_id: usize, value: T) -> bool {
        match &self.storage {
            Storage::Buffered(c) => c.register_select_send(waiter, operation_id, value),
            Storage::Unbuffered(c) => c.register_select_send(waiter, operation_id, value),
        }
    }

    fn register_select_receive(&self, waiter: Arc<Waiter<T>>, operation_id: usize) -> bool {
        match &self.storage {
            Storage::Buffered(c) => c.register_select_receive(waiter, operation_id),
            Storage::Unbuffered(c) => c.register_select_receive(waiter, operation_id),
        }
    }

    fn deregister_select_send(&self, waiter: &Arc<Waiter<T>>) {
        match &self.storage {
            Storage::Buffered(c) => c.deregister_select_send(waiter),
            Storage::Unbuffered(c) => c.deregister_select_send(waiter),
        }
    }

    fn deregister_select_receive(&self, waiter: &Arc<Waiter<T>>) {
        match &self.storage {
            Storage::Buffered(c) => c.deregister_select_receive(waiter),
            Storage::Unbuffered(c) => c.deregister_select_receive(waiter),
        }
    }

    fn is_closed(&self) -> bool {
        match &self.storage {
            Storage::Buffered(c) => Selectable::is_closed(c),
            Storage::Unbuffered(c) => Selectable::is_closed(c),
        }
    }
}
