// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// CSP-style typed channels for OS threads: bounded ring-backed buffered
// channels, rendezvous unbuffered channels, and a multi-way `select` over
// either kind. `make_channel(capacity)` picks the storage strategy from
// the capacity alone — `0` means unbuffered.

mod mem;
pub use mem::*;

mod spin_lock;

mod semaphore;

mod waiter;

mod waiter_pool;

mod queue;

mod ring;

pub mod select;
pub use select::{select, SelectOp, SelectOutcome, Selectable};

mod buffered;
mod unbuffered;

mod channel;
pub use channel::{make_channel, Channel};
