// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A reusable per-operation synchronization object. Combines a counted
// semaphore with a small state machine so the same object can serve as
// both a plain "block until woken" park and a select participant that
// gets atomically bound to exactly one channel outcome.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use crate::select::Selection;
use crate::semaphore::Semaphore;

/// Legal states for a [`Waiter`]. See the module docs for the transition
/// diagram; [`Waiter::set_state`] enforces it with a CAS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum State {
    /// Freshly obtained from the pool, not yet registered anywhere.
    Ready = 0,
    /// Parked on an unbuffered channel's sender/receiver queue; `payload`
    /// holds (or will receive) the value being handed off directly.
    Pointer = 1,
    /// Parked as a select participant, registered on one or more channels,
    /// not yet claimed by any of them.
    WaitSelect = 2,
    /// Claimed by exactly one channel operation; `selection` names it.
    Select = 3,
    /// Claimed by a rendezvous between two select participants on an
    /// unbuffered channel; an intermediary waiter carries the payload.
    DoubleSelect = 4,
    /// Every channel the waiter was registered with has closed.
    Invalidated = 5,
    /// Terminal: the owning thread has observed the outcome and is done
    /// with this waiter. Only a pool `release`/`obtain` cycle moves it
    /// back to `Ready`.
    Done = 6,
}

impl State {
    fn from_u8(v: u8) -> State {
        match v {
            0 => State::Ready,
            1 => State::Pointer,
            2 => State::WaitSelect,
            3 => State::Select,
            4 => State::DoubleSelect,
            5 => State::Invalidated,
            6 => State::Done,
            _ => unreachable!("corrupt waiter state byte {v}"),
        }
    }
}

/// Reusable synchronization object for both plain blocking waits and
/// select participation. `T` is the element type of the channel(s) it is
/// used with; a waiter is never shared across channels of different
/// element types (see DESIGN.md for why this departs from a single
/// process-wide untyped pool).
pub(crate) struct Waiter<T> {
    sem: Semaphore,
    state: AtomicU8,
    payload: Mutex<Option<T>>,
    selection: Mutex<Option<Selection>>,
}

impl<T> Waiter<T> {
    pub(crate) fn new() -> Self {
        Self {
            sem: Semaphore::new(),
            state: AtomicU8::new(State::Ready as u8),
            payload: Mutex::new(None),
            selection: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// CAS from `from` to `to`. Returns whether it succeeded. Callers that
    /// lose the race move on — another branch of a select, or a racing
    /// close(), got there first.
    pub(crate) fn set_state(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditional move to `Done`. Always succeeds eventually; retries
    /// because a concurrent CAS (e.g. a close() racing a commit) may be
    /// touching the same byte.
    pub(crate) fn force_done(&self) {
        loop {
            let cur = self.state.load(Ordering::Acquire);
            if self
                .state
                .compare_exchange(cur, State::Done as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Unconditional store, bypassing the CAS gate entirely. Used only to
    /// undo a provisional claim on a waiter no other thread can currently
    /// observe (e.g. unwinding a `DoubleSelect` attempt whose counterpart
    /// CAS lost a race) — never on a waiter that might be concurrently
    /// inspected by another thread.
    pub(crate) fn force_state(&self, to: State) {
        self.state.store(to as u8, Ordering::Release);
    }

    /// Force-invalidate this waiter from any of the "still pending"
    /// states. Used by `close()` to wake every parked waiter; no-op
    /// (and returns `false`) if the waiter already moved on to a terminal
    /// or claimed state — that is the "stale entry, skip it" case.
    pub(crate) fn invalidate(&self) -> bool {
        for from in [State::Ready, State::Pointer, State::WaitSelect] {
            if self.set_state(from, State::Invalidated) {
                return true;
            }
        }
        false
    }

    pub(crate) fn wait(&self) {
        self.sem.wait();
    }

    pub(crate) fn signal(&self) {
        self.sem.signal();
    }

    /// Store `value` into the payload slot. Only valid (and only takes
    /// effect) while the state is `Pointer` or `DoubleSelect`.
    pub(crate) fn attach_pointer(&self, value: T) -> Result<(), T> {
        match self.state() {
            State::Pointer | State::DoubleSelect => {
                *self.payload.lock().unwrap() = Some(value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    pub(crate) fn take_pointer(&self) -> Option<T> {
        self.payload.lock().unwrap().take()
    }

    /// Unconditionally store `value` in the payload slot, bypassing the
    /// `Pointer`/`DoubleSelect` state gate `attach_pointer` enforces. Used
    /// only by select registration, where the waiter is legitimately in
    /// `WaitSelect` while it carries a send arm's value, waiting for some
    /// channel to claim it.
    pub(crate) fn stash_payload(&self, value: T) {
        *self.payload.lock().unwrap() = Some(value);
    }

    pub(crate) fn attach_selection(&self, selection: Selection) {
        *self.selection.lock().unwrap() = Some(selection);
    }

    pub(crate) fn take_selection(&self) -> Option<Selection> {
        self.selection.lock().unwrap().take()
    }

    /// Checked before a waiter is handed back to the pool. Panics (an
    /// `InvariantViolation`, per the crate's error taxonomy) if the
    /// waiter is released with a dangling payload or from an illegal
    /// state — that always indicates a bug in the caller, not a
    /// recoverable condition. Pooled waiters never see `DoubleSelect`:
    /// that state only ever touches a select call's own `Arc::new`
    /// waiter, which bypasses the pool entirely.
    pub(crate) fn validate_for_release(&self) {
        let state = self.state();
        assert!(
            matches!(state, State::Ready | State::Done),
            "waiter released from illegal state {state:?}"
        );
        assert!(
            self.payload.lock().unwrap().is_none(),
            "waiter released with a dangling payload"
        );
    }

    /// Drain any lingering semaphore debt and drop stale selection data,
    /// then move to `Ready` for the next `obtain()`. Called by the pool
    /// right after `validate_for_release` succeeds.
    pub(crate) fn drain_and_make_ready(&self) {
        self.selection.lock().unwrap().take();
        self.sem.drain();
        self.state.store(State::Ready as u8, Ordering::Release);
    }
}
