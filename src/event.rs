//! The event record: a closure plus whatever bookkeeping its kind needs.
//!
//! All three event kinds (plain closure, timer, signal listener) live in one
//! pool as a single `Event` type with an inline enum discriminant, the same
//! shape the teacher uses for `VmaFlags`-tagged records and for
//! `Zombie`/`FutexWaiter` entries that carry a payload alongside list
//! linkage — one struct, one pool, no trait objects.

use bitflags::bitflags;

use crate::closure::Closure;
use crate::handle::Handle;

/// Handle to a slot in the system's event pool.
pub type EventHandle = Handle<Event>;

bitflags! {
    /// Flags controlling a timer event's re-arming behavior.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TimerFlags: u32 {
        /// Re-arm the timer after it fires instead of retiring it.
        const REPEATING = 1 << 0;
        /// Fire once immediately on registration, in addition to the normal
        /// due-time schedule.
        const IMMEDIATE = 1 << 1;
        /// Set by `cancel`; the scheduler drops the timer the next time it
        /// is visited instead of invoking its closure.
        const CANCELLED = 1 << 2;
    }
}

/// Per-timer scheduling state.
#[derive(Clone, Copy, Debug)]
pub struct TimerState {
    pub due: u32,
    pub period: u32,
    pub flags: TimerFlags,
}

/// Payload carried from `emit` to a signal listener's closure.
///
/// Read back by the listener's own closure body via
/// [`crate::relay::SignalRelay::param_of`] — the run loop always invokes a
/// closure with `params = event` (the event being itself), so a separate
/// side channel is how the emitted value actually reaches the listener.
pub type SignalParam = usize;

/// Per-listener signal registration state.
#[derive(Clone, Copy, Debug)]
pub struct SignalListenerState {
    pub signal: u32,
    pub once: bool,
    pub param: SignalParam,
    /// Cleared by `unlisten`. A listener stays in its signal's list and in
    /// the event pool until this is noticed — by a later `emit` sweeping
    /// its list, or by the run loop if the listener had already been
    /// queued to run — rather than being unlinked/released at `unlisten`
    /// time itself, which could race a handle already sitting in the ready
    /// queue.
    pub listening: bool,
}

/// What kind of event this slot represents, and that kind's extra state.
#[derive(Clone, Copy, Debug)]
pub enum EventKind {
    /// A one-shot closure queued for the next `run()` drain.
    Closure,
    /// A closure scheduled to run at (and possibly after) a due time.
    Timer(TimerState),
    /// A closure registered against a signal.
    SignalListener(SignalListenerState),
}

/// One pool slot: a closure plus its kind-specific bookkeeping.
#[derive(Clone, Copy)]
pub struct Event {
    pub closure: Closure,
    pub kind: EventKind,
}

impl Event {
    #[inline]
    pub const fn closure_event(closure: Closure) -> Self {
        Self {
            closure,
            kind: EventKind::Closure,
        }
    }

    #[inline]
    pub const fn timer_event(closure: Closure, state: TimerState) -> Self {
        Self {
            closure,
            kind: EventKind::Timer(state),
        }
    }

    #[inline]
    pub const fn signal_listener_event(closure: Closure, state: SignalListenerState) -> Self {
        Self {
            closure,
            kind: EventKind::SignalListener(state),
        }
    }

    /// The timer state, if this is a timer event.
    #[inline]
    pub fn timer_state(&self) -> Option<&TimerState> {
        match &self.kind {
            EventKind::Timer(state) => Some(state),
            _ => None,
        }
    }

    #[inline]
    pub fn timer_state_mut(&mut self) -> Option<&mut TimerState> {
        match &mut self.kind {
            EventKind::Timer(state) => Some(state),
            _ => None,
        }
    }

    /// The signal listener state, if this is a signal listener event.
    #[inline]
    pub fn listener_state(&self) -> Option<&SignalListenerState> {
        match &self.kind {
            EventKind::SignalListener(state) => Some(state),
            _ => None,
        }
    }

    #[inline]
    pub fn listener_state_mut(&mut self) -> Option<&mut SignalListenerState> {
        match &mut self.kind {
            EventKind::SignalListener(state) => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: *mut (), _params: EventHandle) -> i32 {
        0
    }

    #[test]
    fn timer_flags_compose() {
        let flags = TimerFlags::REPEATING | TimerFlags::IMMEDIATE;
        assert!(flags.contains(TimerFlags::REPEATING));
        assert!(flags.contains(TimerFlags::IMMEDIATE));
        assert!(!flags.contains(TimerFlags::CANCELLED));
    }

    #[test]
    fn timer_event_exposes_state() {
        let state = TimerState {
            due: 100,
            period: 0,
            flags: TimerFlags::empty(),
        };
        let mut event = Event::timer_event(Closure::new(noop, core::ptr::null_mut()), state);
        assert_eq!(event.timer_state().unwrap().due, 100);
        event.timer_state_mut().unwrap().due = 200;
        assert_eq!(event.timer_state().unwrap().due, 200);
        assert!(event.listener_state().is_none());
    }
}
