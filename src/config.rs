//! Compile-time capacities and the default critical section.
//!
//! Sized with const generics rather than the teacher's log2-shifted
//! capacities (`slopos_lib::ring_buffer` takes a shift and derives
//! `1 << shift`); this crate's capacities are domain quantities (how many
//! outstanding events, how many queued timers) so taking them directly and
//! asserting power-of-two at const-eval time (see [`crate::queue`]) reads
//! clearer at the call site than a shift count would.

use crate::lock::NoCriticalSection;
use crate::system::System;

/// Default event pool capacity (closures, timers, and signal listeners
/// combined share one pool).
pub const DEFAULT_EVENT_POOL: usize = 128;

/// Default node pool capacity backing the timer list and signal listener
/// lists.
pub const DEFAULT_NODE_POOL: usize = 128;

/// Default depth of the ready-to-run closure queue.
pub const DEFAULT_EVENT_QUEUE: usize = 32;

/// Default depth of the schedule queue `run_later`/`run_at_intervals` stage
/// newly registered timers onto before `tick()` inserts them into the
/// sorted timer list.
pub const DEFAULT_SCHEDULE_QUEUE: usize = 16;

/// Default number of signal "slots" a [`crate::relay::SignalRelay`]
/// multiplexes; advisory capacity for callers that want a `const` array of
/// named signals rather than raw `u32` identifiers.
pub const DEFAULT_SIGNAL_WIDTH: usize = 16;

/// Advisory maximum number of listeners per signal (§3). Not enforced here:
/// listener lists are bounded only by the shared node pool, the same way
/// the teacher leaves `FutexBucket` waiter counts unbounded except by the
/// backing pool. Hosts that need a hard per-signal cap enforce it in their
/// own listener registration wrapper.
pub const DEFAULT_SIGNAL_MAX_LISTENERS: usize = 5;

/// A [`System`] configured with this crate's default capacities and the
/// no-op critical section, suitable for single-threaded hosted tests and
/// platforms that cooperatively schedule their ISR equivalent.
pub type DefaultSystem = System<
    NoCriticalSection,
    DEFAULT_EVENT_POOL,
    DEFAULT_NODE_POOL,
    DEFAULT_EVENT_QUEUE,
    DEFAULT_SCHEDULE_QUEUE,
>;
