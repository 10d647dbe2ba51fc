//! Timer scheduling: one-shot and repeating closures ordered by due time.
//!
//! Grounded on `slopos_core::scheduler::sleep`'s due-time list (a sorted
//! wait queue keyed on wake tick) and on the ticket-ordering discipline in
//! `sched_tests.rs`, which insists ties break by arrival order rather than
//! by address or by chance. Kept as free functions over borrowed pool/list
//! state rather than methods on a struct that owns them, so the same state
//! can be reached from both `tick()` and `on_timer_isr()` without a
//! self-referential `Scheduler` holding its own borrow of the pools.
//!
//! Registration (`run_later`/`run_at_intervals`) never walks or mutates
//! `timers` directly — it only acquires an event and stages it on the
//! schedule queue. The sorted insert into `timers` happens later, in
//! `manage_timers`, which only ever runs from main context. This is what
//! lets `run_later`/`run_at_intervals` be called safely from an ISR: the
//! work they do is an O(1) pool acquire and queue push, never an O(n) list
//! walk.

use crate::closure::Closure;
use crate::event::{Event, EventHandle, TimerFlags, TimerState};
use crate::llist::{ListHead, Node};
use crate::pool::ObjectPool;
use crate::queue::CircularQueue;

/// Forward distance from `now` to `x`, wrapping at `u32::MAX`. Two due
/// times are ordered by comparing their distances from the same `now`
/// rather than comparing the raw values, so a 32-bit tick counter can wrap
/// without timers registered just before the wrap jumping ahead of ones
/// registered just after it. Valid as long as no timer's horizon (its delay
/// or period) exceeds `u32::MAX / 2` ticks, which the spec leaves as the
/// implicit bound on how far ahead a timer may be scheduled.
#[inline]
fn relative(x: u32, now: u32) -> u32 {
    x.wrapping_sub(now)
}

/// Whether `due` has arrived by `now`, using the same wraparound-safe
/// comparison as [`relative`].
#[inline]
fn is_due(due: u32, now: u32) -> bool {
    (due.wrapping_sub(now) as i32) <= 0
}

fn stage<const EV: usize, const SQ: usize>(
    events: &mut ObjectPool<Event, EV>,
    schedule_queue: &mut CircularQueue<EventHandle, SQ>,
    closure: Closure,
    due: u32,
    period: u32,
    flags: TimerFlags,
) -> Option<EventHandle> {
    let handle = events.acquire()?;
    events.put(handle, Event::timer_event(closure, TimerState { due, period, flags }));
    if !schedule_queue.push(handle) {
        events.release(handle);
        return None;
    }
    Some(handle)
}

/// Set the scheduler's clock to `new_time`. Called from the periodic ISR;
/// intentionally does nothing but the one write — no list walk, so it is
/// safe to call from interrupt context.
#[inline]
pub fn update_timer(now: &mut u32, new_time: u32) {
    *now = new_time;
}

/// Register `closure` to run once after `delay` ticks, by staging it on
/// the schedule queue for `manage_timers` to insert into the timer list.
/// Returns `None` if the event pool or schedule queue is full.
pub fn run_later<const EV: usize, const SQ: usize>(
    events: &mut ObjectPool<Event, EV>,
    schedule_queue: &mut CircularQueue<EventHandle, SQ>,
    now: u32,
    closure: Closure,
    delay: u32,
) -> Option<EventHandle> {
    stage(events, schedule_queue, closure, now.wrapping_add(delay), 0, TimerFlags::empty())
}

/// Register `closure` to run every `period` ticks. When `immediate` is
/// set the first fire happens on the next `manage_timers` pass instead of
/// waiting a full period.
pub fn run_at_intervals<const EV: usize, const SQ: usize>(
    events: &mut ObjectPool<Event, EV>,
    schedule_queue: &mut CircularQueue<EventHandle, SQ>,
    now: u32,
    closure: Closure,
    period: u32,
    immediate: bool,
) -> Option<EventHandle> {
    debug_assert!(period > 0, "repeating timers must have a nonzero period");
    let due = if immediate { now } else { now.wrapping_add(period) };
    let mut flags = TimerFlags::REPEATING;
    if immediate {
        flags |= TimerFlags::IMMEDIATE;
    }
    stage(events, schedule_queue, closure, due, period, flags)
}

/// Mark a registered timer cancelled. It is skipped (and its slot
/// released) the next time the scheduler or run loop reaches it, rather
/// than being unlinked immediately — cancellation can race a timer that
/// already fired and is sitting in the ready queue this tick, and the flag
/// check at both sites covers that case uniformly. Returns `false` if
/// `handle` does not refer to a live timer event.
pub fn cancel<const EV: usize>(events: &mut ObjectPool<Event, EV>, handle: EventHandle) -> bool {
    // SAFETY: caller-supplied handle; an invalid one yields an arbitrary
    // slot, matching the trust-boundary contract noted on `ObjectPool`.
    match unsafe { events.get_mut(handle) }.timer_state_mut() {
        Some(state) => {
            state.flags |= TimerFlags::CANCELLED;
            true
        }
        None => false,
    }
}

fn insert_due_sorted<const EV: usize, const ND: usize>(
    events: &ObjectPool<Event, EV>,
    nodes: &mut ObjectPool<Node, ND>,
    timers: &mut ListHead,
    now: u32,
    handle: EventHandle,
    due: u32,
) -> Option<crate::llist::NodeHandle> {
    timers.insert_sorted_by(nodes, handle, |existing| {
        let existing_due = unsafe { events.get(existing) }
            .timer_state()
            .expect("timer list only ever holds timer events")
            .due;
        relative(due, now) < relative(existing_due, now)
    })
}

/// Called from main context only. Performs, in order:
///
/// 1. **Drain the schedule queue.** Every event staged by `run_later`/
///    `run_at_intervals` since the last call is inserted into `timers` at
///    its sorted position.
/// 2. **Collect due timers.** Walk `timers` from the head while the due
///    time has arrived, pushing each onto `ready` in list order and
///    re-arming repeating ones for their next period.
///
/// Returns the number of closures pushed onto `ready`.
pub fn manage_timers<const EV: usize, const ND: usize, const SQ: usize, const EQ: usize>(
    events: &mut ObjectPool<Event, EV>,
    nodes: &mut ObjectPool<Node, ND>,
    timers: &mut ListHead,
    schedule_queue: &mut CircularQueue<EventHandle, SQ>,
    ready: &mut CircularQueue<EventHandle, EQ>,
    now: u32,
) -> u32 {
    while let Some(handle) = schedule_queue.pop() {
        let due = unsafe { events.get(handle) }
            .timer_state()
            .expect("schedule queue only ever holds timer events")
            .due;
        if insert_due_sorted(events, nodes, timers, now, handle, due).is_none() {
            crate::log_warn!("node pool full, dropping a staged timer");
            events.release(handle);
        }
    }

    let mut fired = 0;
    loop {
        let Some(head) = timers.peek_head(nodes) else {
            break;
        };
        let due = unsafe { events.get(head) }
            .timer_state()
            .expect("timer list only ever holds timer events")
            .due;
        if !is_due(due, now) {
            break;
        }
        let handle = timers.pop_head(nodes).expect("peek just confirmed a head");
        let state = *unsafe { events.get(handle) }
            .timer_state()
            .expect("timer list only ever holds timer events");

        if state.flags.contains(TimerFlags::CANCELLED) {
            events.release(handle);
            continue;
        }

        if state.flags.contains(TimerFlags::REPEATING) {
            let new_due = due.wrapping_add(state.period);
            if let Some(s) = unsafe { events.get_mut(handle) }.timer_state_mut() {
                s.due = new_due;
            }
            insert_due_sorted(events, nodes, timers, now, handle, new_due);
        }

        if ready.push(handle) {
            fired += 1;
        } else {
            crate::log_warn!("event queue full, dropping a timer fire");
            if !state.flags.contains(TimerFlags::REPEATING) {
                events.release(handle);
            }
        }
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: *mut (), _params: EventHandle) -> i32 {
        0
    }

    struct Fixture {
        events: ObjectPool<Event, 16>,
        nodes: ObjectPool<Node, 16>,
        timers: ListHead,
        schedule_queue: CircularQueue<EventHandle, 16>,
        ready: CircularQueue<EventHandle, 16>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                events: ObjectPool::new(),
                nodes: ObjectPool::new(),
                timers: ListHead::new(),
                schedule_queue: CircularQueue::new(crate::handle::Handle::new(0)),
                ready: CircularQueue::new(crate::handle::Handle::new(0)),
            }
        }

        fn manage(&mut self, now: u32) -> u32 {
            manage_timers(
                &mut self.events,
                &mut self.nodes,
                &mut self.timers,
                &mut self.schedule_queue,
                &mut self.ready,
                now,
            )
        }
    }

    #[test]
    fn run_later_only_stages_on_schedule_queue_until_managed() {
        let mut f = Fixture::new();
        run_later(&mut f.events, &mut f.schedule_queue, 0, Closure::new(noop, core::ptr::null_mut()), 10).unwrap();
        assert_eq!(f.schedule_queue.count(), 1);
        assert_eq!(f.timers.len(), 0, "a staged timer must not appear in the list until manage_timers drains it");
    }

    #[test]
    fn one_shot_fires_once_and_retires_from_timers_list() {
        let mut f = Fixture::new();
        run_later(&mut f.events, &mut f.schedule_queue, 0, Closure::new(noop, core::ptr::null_mut()), 10).unwrap();
        assert_eq!(f.manage(5), 0);
        assert_eq!(f.timers.len(), 1);
        assert_eq!(f.manage(10), 1);
        assert_eq!(f.ready.count(), 1);
        assert_eq!(f.timers.len(), 0);
    }

    #[test]
    fn repeating_timer_reschedules_after_firing() {
        let mut f = Fixture::new();
        run_at_intervals(&mut f.events, &mut f.schedule_queue, 0, Closure::new(noop, core::ptr::null_mut()), 10, false).unwrap();
        assert_eq!(f.manage(10), 1);
        assert_eq!(f.timers.len(), 1);
        assert_eq!(f.manage(20), 1);
        assert_eq!(f.ready.count(), 2);
    }

    #[test]
    fn immediate_repeating_timer_fires_on_first_pass() {
        let mut f = Fixture::new();
        run_at_intervals(&mut f.events, &mut f.schedule_queue, 100, Closure::new(noop, core::ptr::null_mut()), 10, true).unwrap();
        assert_eq!(f.manage(100), 1);
    }

    #[test]
    fn cancelled_timer_is_dropped_without_firing() {
        let mut f = Fixture::new();
        let handle = run_later(&mut f.events, &mut f.schedule_queue, 0, Closure::new(noop, core::ptr::null_mut()), 10).unwrap();
        assert!(cancel(&mut f.events, handle));
        assert_eq!(f.manage(10), 0);
        assert_eq!(f.ready.count(), 0);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let mut f = Fixture::new();
        let first = run_later(&mut f.events, &mut f.schedule_queue, 0, Closure::new(noop, core::ptr::null_mut()), 5).unwrap();
        let second = run_later(&mut f.events, &mut f.schedule_queue, 0, Closure::new(noop, core::ptr::null_mut()), 5).unwrap();
        f.manage(0);
        assert_eq!(f.timers.peek_head(&f.nodes), Some(first));
        f.manage(5);
        assert_eq!(f.ready.pop(), Some(first));
        assert_eq!(f.ready.pop(), Some(second));
    }

    #[test]
    fn due_time_survives_wraparound() {
        let mut f = Fixture::new();
        let now = u32::MAX - 2;
        run_later(&mut f.events, &mut f.schedule_queue, now, Closure::new(noop, core::ptr::null_mut()), 5).unwrap();
        f.manage(now);
        // due = now + 5 wraps past u32::MAX to 2.
        assert_eq!(f.manage(u32::MAX), 0);
        assert_eq!(f.manage(2), 1);
    }

    #[test]
    fn update_timer_only_writes_the_clock() {
        let mut now = 0u32;
        update_timer(&mut now, 42);
        assert_eq!(now, 42);
    }
}
