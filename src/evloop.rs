//! The run-to-completion drain loop.
//!
//! Grounded on the cooperative, non-preemptive scheduling style described
//! for `slopos_core::scheduler` (one task runs until it yields); here there
//! is no yielding at all; a queued closure always runs to its natural
//! return before the next one starts. `run()` only ever processes what was
//! queued *before* it was called — a closure that enqueues another closure
//! is for the next `run()`, never this one — so a steady stream of
//! self-resubmitting work can't starve the host's other responsibilities.

use crate::closure::Closure;
use crate::event::{Event, EventHandle, EventKind, TimerFlags};
use crate::pool::ObjectPool;
use crate::queue::CircularQueue;

/// Acquire an event slot for `closure` and enqueue it to run on the next
/// [`run`]. Returns `None` if the event pool or the ready queue is full.
pub fn enqueue_closure<const EV: usize, const EQ: usize>(
    events: &mut ObjectPool<Event, EV>,
    ready: &mut CircularQueue<EventHandle, EQ>,
    closure: Closure,
) -> Option<EventHandle> {
    let handle = events.acquire()?;
    events.put(handle, Event::closure_event(closure));
    if !ready.push(handle) {
        events.release(handle);
        return None;
    }
    Some(handle)
}

/// What to do with an event's pool slot once its closure has run.
enum Disposition {
    /// The event was a one-shot; release its slot.
    Retire,
    /// The event stays registered (a repeating timer or a still-listening
    /// signal listener); leave the slot alone.
    Keep,
    /// The event was cancelled before it could run; skip invocation
    /// entirely and release its slot.
    Drop,
}

fn disposition(event: &Event) -> Disposition {
    match &event.kind {
        EventKind::Closure => Disposition::Retire,
        EventKind::Timer(state) => {
            if state.flags.contains(TimerFlags::CANCELLED) {
                Disposition::Drop
            } else if state.flags.contains(TimerFlags::REPEATING) {
                Disposition::Keep
            } else {
                Disposition::Retire
            }
        }
        EventKind::SignalListener(state) => {
            if !state.listening {
                Disposition::Drop
            } else if state.once {
                Disposition::Retire
            } else {
                Disposition::Keep
            }
        }
    }
}

/// One step of the drain, taken while the host's lock is held.
pub enum ReadyItem {
    /// A closure is ready to invoke outside the lock. `retire` says
    /// whether [`finish_ready`] should release its event slot afterward.
    Run {
        handle: EventHandle,
        closure: Closure,
        retire: bool,
    },
    /// The popped event was cancelled; it has already been released and
    /// nothing should be invoked for it, but the caller's budget for this
    /// drain should still count it as one step taken.
    Skipped,
}

/// Pop one handle from `ready` and decide what to do with it, without
/// invoking anything. Split out from [`run`] so a caller that cannot hold
/// its lock across arbitrary closure code (notably
/// [`crate::system::System::tick`], whose closures are free to call back
/// into the same `System`) can invoke the closure outside the critical
/// section and come back for [`finish_ready`].
pub fn pop_ready<const EV: usize, const EQ: usize>(
    events: &mut ObjectPool<Event, EV>,
    ready: &mut CircularQueue<EventHandle, EQ>,
) -> Option<ReadyItem> {
    let handle = ready.pop()?;
    // SAFETY: `handle` was produced by `acquire` on this same pool and has
    // not yet been released (it only reaches `ready` while live).
    match disposition(unsafe { events.get(handle) }) {
        Disposition::Drop => {
            events.release(handle);
            Some(ReadyItem::Skipped)
        }
        Disposition::Retire => Some(ReadyItem::Run {
            handle,
            closure: unsafe { events.get(handle) }.closure,
            retire: true,
        }),
        Disposition::Keep => Some(ReadyItem::Run {
            handle,
            closure: unsafe { events.get(handle) }.closure,
            retire: false,
        }),
    }
}

/// Write an invoked closure's updated state back into its event slot, and
/// release that slot if `retire` is set. Call after running the closure
/// returned by [`pop_ready`].
pub fn finish_ready<const EV: usize>(events: &mut ObjectPool<Event, EV>, handle: EventHandle, closure: Closure, retire: bool) {
    unsafe { events.get_mut(handle) }.closure = closure;
    if retire {
        unsafe { events.get_mut(handle) }.closure.destroy();
        events.release(handle);
    }
}

/// Drain every event that was ready when `run` was called, invoking each
/// closure exactly once with `params` set to the event's own handle.
/// Returns the number of closures invoked.
pub fn run<const EV: usize, const EQ: usize>(
    events: &mut ObjectPool<Event, EV>,
    ready: &mut CircularQueue<EventHandle, EQ>,
) -> u32 {
    let snapshot = ready.count();
    let mut processed = 0;
    for _ in 0..snapshot {
        let Some(handle) = ready.pop() else { break };
        // SAFETY: `handle` was produced by `acquire` on this same pool and
        // has not yet been released (it only reaches `ready` while live).
        let disposition = disposition(unsafe { events.get(handle) });
        if matches!(disposition, Disposition::Drop) {
            events.release(handle);
            continue;
        }
        unsafe { events.get_mut(handle) }.closure.invoke(handle);
        processed += 1;
        if matches!(disposition, Disposition::Retire) {
            unsafe { events.get_mut(handle) }.closure.destroy();
            events.release(handle);
        }
    }
    processed
}
