// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A rendezvous channel: a send only completes once a receiver is there to
// take it, and vice versa. There is no backing storage, so a value moves
// directly from the sending side's waiter to the receiving side's.
//
// Two distinct parking states are in play. A plain blocking `send`/
// `receive` that finds no immediate match parks in `Pointer` — it is
// registered on this channel alone, so whichever thread later pops it
// from the queue is the only other party that will ever touch it. A
// `select()` participant parks in `WaitSelect` instead, because the same
// waiter may be registered across several channels at once; claiming one
// requires a CAS that can lose a race to a different channel. When two
// `WaitSelect` waiters (one send-side, one receive-side, each possibly
// shared with other channels) meet here, the committing side provisionally
// holds the other in `DoubleSelect` while it confirms its own claim,
// rolling back if that second claim is lost.

use std::sync::Arc;

use crate::queue::{RecvItem, SendItem, WaiterQueue};
use crate::select::{Selectable, Selection};
use crate::spin_lock::Locked;
use crate::waiter::{State, Waiter};
use crate::waiter_pool::WaiterPool;

struct Inner<T> {
    closed: bool,
    send_waiters: WaiterQueue<SendItem<T>>,
    recv_waiters: WaiterQueue<RecvItem<T>>,
}

pub(crate) struct UnbufferedChannel<T> {
    inner: Locked<Inner<T>>,
    pool: WaiterPool<T>,
}

impl<T> UnbufferedChannel<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Locked::new(Inner {
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

    /// Blocking send. Returns `false` if the channel is (or becomes, while
    /// parked) closed before a receiver claims the value.
    pub(crate) fn send(&self, value: T) -> bool {
        let mut guard = self.inner.lock();
        if guard.closed {
            return false;
        }
        let mut value = value;
        loop {
            let Some(item) = guard.recv_waiters.pop_front() else {
                break;
            };
            match claim_plain_into(&item.waiter, item.operation_id, value) {
                Ok(()) => {
                    drop(guard);
                    item.waiter.signal();
                    return true;
                }
                Err(back) => {
                    value = back;
                    continue;
                }
            }
        }

        let waiter = self.pool.obtain();
        assert!(waiter.set_state(State::Ready, State::Pointer));
        guard
            .send_waiters
            .push_back(SendItem::new(Arc::clone(&waiter), 0, value));
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

    /// Blocking receive. Returns `None` once the channel is closed with no
    /// sender left to rendezvous with.
    pub(crate) fn receive(&self) -> Option<T> {
        let mut guard = self.inner.lock();
        loop {
            let Some(item) = guard.send_waiters.pop_front() else {
                break;
            };
            if let Some(value) = claim_plain_sender(&item) {
                drop(guard);
                item.waiter.signal();
                return Some(value);
            }
        }

        if guard.closed {
            return None;
        }

        let waiter = self.pool.obtain();
        assert!(waiter.set_state(State::Ready, State::Pointer));
        guard.recv_waiters.push_back(RecvItem {
            waiter: Arc::clone(&waiter),
            operation_id: 0,
        });
        drop(guard);

        waiter.wait();
        match waiter.state() {
            State::Done => {
                let value = waiter.take_pointer();
                self.pool.release(waiter);
                value
            }
            State::Invalidated => {
                self.pool.release(waiter);
                None
            }
            other => unreachable!("receiver waiter woke in unexpected state {other:?}"),
        }
    }

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

/// A plain (non-select) send claiming a popped parked receiver. `Pointer`
/// entries are single-channel and always claimable under our own lock;
/// `WaitSelect` entries may be shared across channels and can legitimately
/// lose the race to a different one. On failure the value is handed back
/// so the caller can try the next queued receiver. `opposite_operation_id`
/// is the claimed receiver's own arm index within whatever select call it
/// may belong to — meaningless (and unused) when `opposite` is a plain
/// `Pointer` waiter.
fn claim_plain_into<T>(
    opposite: &Arc<Waiter<T>>,
    opposite_operation_id: usize,
    value: T,
) -> Result<(), T> {
    let opposite_state = opposite.state();
    let claimed = match opposite_state {
        State::Pointer => opposite.set_state(State::Pointer, State::Done),
        State::WaitSelect => opposite.set_state(State::WaitSelect, State::Select),
        _ => false,
    };
    if !claimed {
        return Err(value);
    }
    opposite.stash_payload(value);
    if opposite_state == State::WaitSelect {
        opposite.attach_selection(Selection {
            operation_id: opposite_operation_id,
        });
    }
    opposite.force_done();
    Ok(())
}

/// Symmetric to [`claim_plain_into`] for a plain receive claiming a
/// popped parked sender. Returns the delivered value on success.
fn claim_plain_sender<T>(item: &SendItem<T>) -> Option<T> {
    let claimed = match item.waiter.state() {
        State::Pointer => item.waiter.set_state(State::Pointer, State::Done),
        State::WaitSelect => item.waiter.set_state(State::WaitSelect, State::Select),
        _ => false,
    };
    if !claimed {
        return None;
    }
    let value = item
        .value
        .lock()
        .unwrap()
        .take()
        .expect("claimed sender missing its value");
    if item.waiter.state() == State::Select {
        item.waiter.attach_selection(Selection {
            operation_id: item.operation_id,
        });
        item.waiter.force_done();
    }
    Some(value)
}

/// A select-registered send claiming a popped parked receiver, where our
/// own `waiter` may itself be shared across other channels. We must claim
/// our own slot before touching the opposite one: if the opposite's CAS
/// then fails (a cross-channel race on an also-`WaitSelect` receiver), we
/// can cheaply roll our own claim back since nothing observable happened.
///
/// When `opposite` is itself a select participant (`WaitSelect`), it needs
/// a `Selection` of its own — carrying *its* arm index (`opposite_operation_id`,
/// the receive arm's index within whatever select call registered it), not
/// ours — so that call's `slow_path` knows which of its arms committed.
fn claim_select_into<T>(
    my_waiter: &Arc<Waiter<T>>,
    my_operation_id: usize,
    opposite: &Arc<Waiter<T>>,
    opposite_operation_id: usize,
    value: T,
) -> Result<(), T> {
    if !my_waiter.set_state(State::WaitSelect, State::Select) {
        return Err(value);
    }
    let opposite_state = opposite.state();
    let opposite_claimed = match opposite_state {
        State::Pointer => opposite.set_state(State::Pointer, State::Done),
        State::WaitSelect => opposite.set_state(State::WaitSelect, State::DoubleSelect),
        _ => false,
    };
    if !opposite_claimed {
        // Nothing committed yet; undo our own claim and let the caller
        // try the next queued entry.
        my_waiter.force_state(State::WaitSelect);
        return Err(value);
    }
    opposite.stash_payload(value);
    if opposite_state == State::WaitSelect {
        opposite.attach_selection(Selection {
            operation_id: opposite_operation_id,
        });
    }
    opposite.force_done();
    my_waiter.attach_selection(Selection {
        operation_id: my_operation_id,
    });
    my_waiter.force_done();
    Ok(())
}

/// Symmetric to [`claim_select_into`] for a select-registered receive
/// claiming a popped parked sender. `item.operation_id` already carries
/// the sender's own arm index, so no extra parameter is needed here.
fn claim_select_sender<T>(
    my_waiter: &Arc<Waiter<T>>,
    my_operation_id: usize,
    item: &SendItem<T>,
) -> Option<T> {
    if !my_waiter.set_state(State::WaitSelect, State::Select) {
        return None;
    }
    let opposite_state = item.waiter.state();
    let opposite_claimed = match opposite_state {
        State::Pointer => item.waiter.set_state(State::Pointer, State::Done),
        State::WaitSelect => item.waiter.set_state(State::WaitSelect, State::DoubleSelect),
        _ => false,
    };
    if !opposite_claimed {
        my_waiter.force_state(State::WaitSelect);
        return None;
    }
    let value = item
        .value
        .lock()
        .unwrap()
        .take()
        .expect("claimed sender missing its value");
    if opposite_state == State::WaitSelect {
        item.waiter.attach_selection(Selection {
            operation_id: item.operation_id,
        });
    }
    item.waiter.force_done();
    my_waiter.attach_selection(Selection {
        operation_id: my_operation_id,
    });
    my_waiter.force_done();
    Some(value)
}

impl<T> Selectable<T> for UnbufferedChannel<T> {
    fn try_select_send(&self, value: T) -> Result<(), T> {
        let mut guard = self.inner.lock();
        if guard.closed {
            return Err(value);
        }
        let mut value = value;
        loop {
            let Some(item) = guard.recv_waiters.pop_front() else {
                break;
            };
            match claim_plain_into(&item.waiter, item.operation_id, value) {
                Ok(()) => {
                    drop(guard);
                    item.waiter.signal();
                    return Ok(());
                }
                Err(back) => {
                    value = back;
                    continue;
                }
            }
        }
        Err(value)
    }

    fn try_select_receive(&self) -> Option<T> {
        let mut guard = self.inner.lock();
        loop {
            let Some(item) = guard.send_waiters.pop_front() else {
                break;
            };
            if let Some(value) = claim_plain_sender(&item) {
                drop(guard);
                item.waiter.signal();
                return Some(value);
            }
        }
        None
    }

    fn register_select_send(&self, waiter: Arc<Waiter<T>>, operation_id: usize, value: T) -> bool {
        let mut guard = self.inner.lock();
        if guard.closed {
            // Leave the arm unregistered rather than invalidating the
            // shared waiter: other arms of this select call may still be
            // open and deserve a chance to commit.
            return false;
        }
        if waiter.state() != State::WaitSelect {
            // Already claimed by a different channel in this same select
            // call before we got here; nothing to do.
            return true;
        }
        let mut value = value;
        loop {
            let Some(item) = guard.recv_waiters.pop_front() else {
                break;
            };
            match claim_select_into(&waiter, operation_id, &item.waiter, item.operation_id, value)
            {
                Ok(()) => {
                    drop(guard);
                    item.waiter.signal();
                    waiter.signal();
                    return true;
                }
                Err(back) => {
                    value = back;
                    if waiter.state() != State::WaitSelect {
                        // Our own claim already lost to a different
                        // channel; this receiver is still live, put it
                        // back for someone else to find.
                        guard.recv_waiters.push_front(item);
                        drop(guard);
                        return true;
                    }
                    continue;
                }
            }
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
        if waiter.state() != State::WaitSelect {
            return true;
        }
        loop {
            let Some(item) = guard.send_waiters.pop_front() else {
                break;
            };
            if let Some(value) = claim_select_sender(&waiter, operation_id, &item) {
                waiter.stash_payload(value);
                drop(guard);
                item.waiter.signal();
                waiter.signal();
                return true;
            }
            if waiter.state() != State::WaitSelect {
                guard.send_waiters.push_front(item);
                drop(guard);
                return true;
            }
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
