//! The application container: the one `static` a host actually declares.
//!
//! Bundles the event pool, node pool, ready queue, and timer list behind a
//! single [`Lock`], the way the teacher bundles a kernel subsystem's
//! mutable state behind one `IrqMutex` rather than one lock per field
//! (`slopos_core`'s `FutexBucket`, `ZombieList`). `System::tick` and
//! `System::on_timer_isr` are the only two entry points a host ever calls;
//! everything else is a thin pass-through that takes the lock, delegates
//! to [`crate::scheduler`]/[`crate::evloop`]/[`crate::relay`], and returns.

use crate::closure::Closure;
use crate::event::{Event, EventHandle, SignalListenerState, SignalParam};
use crate::evloop;
use crate::llist::{ListHead, Node, NodeHandle};
use crate::lock::{CriticalSection, Lock};
use crate::pool::ObjectPool;
use crate::queue::CircularQueue;
use crate::relay::SignalRelay;
use crate::scheduler;

/// Everything a [`System`] protects behind one lock.
struct SharedInner<
    const EV: usize,
    const ND: usize,
    const EQ: usize,
    const SQ: usize,
    const SW: usize,
> {
    events: ObjectPool<Event, EV>,
    nodes: ObjectPool<Node, ND>,
    ready: CircularQueue<EventHandle, EQ>,
    schedule_queue: CircularQueue<EventHandle, SQ>,
    timers: ListHead,
    relay: SignalRelay<SW>,
    now: u32,
}

impl<const EV: usize, const ND: usize, const EQ: usize, const SQ: usize, const SW: usize>
    SharedInner<EV, ND, EQ, SQ, SW>
{
    const fn new() -> Self {
        Self {
            events: ObjectPool::new(),
            nodes: ObjectPool::new(),
            ready: CircularQueue::new(crate::handle::Handle::new(0)),
            schedule_queue: CircularQueue::new(crate::handle::Handle::new(0)),
            timers: ListHead::new(),
            relay: SignalRelay::new(),
            now: 0,
        }
    }
}

/// The statically-sized event loop, timer scheduler, and signal relay for
/// one host application.
///
/// `EV`/`ND` size the event and node pools; `EQ` sizes the ready-to-run
/// closure queue; `SQ` sizes the schedule queue `run_later`/
/// `run_at_intervals` stage newly registered timers onto before `tick()`
/// inserts them into the timer list; `SW` sizes the signal relay's slot
/// table.
/// See [`crate::config`] for this crate's default sizing.
pub struct System<
    L: CriticalSection,
    const EV: usize,
    const ND: usize,
    const EQ: usize,
    const SQ: usize,
    const SW: usize = crate::config::DEFAULT_SIGNAL_WIDTH,
> {
    shared: Lock<L, SharedInner<EV, ND, EQ, SQ, SW>>,
}

impl<L: CriticalSection, const EV: usize, const ND: usize, const EQ: usize, const SQ: usize, const SW: usize>
    System<L, EV, ND, EQ, SQ, SW>
{
    pub const fn new() -> Self {
        Self {
            shared: Lock::new(SharedInner::new()),
        }
    }

    /// Queue `closure` to run on the next `tick()`.
    pub fn enqueue_closure(&self, closure: Closure) -> Option<EventHandle> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        evloop::enqueue_closure(&mut inner.events, &mut inner.ready, closure)
    }

    /// Schedule `closure` to run once after `delay` ticks of host time.
    pub fn run_later(&self, closure: Closure, delay: u32) -> Option<EventHandle> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        let now = inner.now;
        scheduler::run_later(&mut inner.events, &mut inner.schedule_queue, now, closure, delay)
    }

    /// Schedule `closure` to run every `period` ticks, optionally firing
    /// once immediately instead of waiting a full period first.
    pub fn run_at_intervals(&self, closure: Closure, period: u32, immediate: bool) -> Option<EventHandle> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        let now = inner.now;
        scheduler::run_at_intervals(&mut inner.events, &mut inner.schedule_queue, now, closure, period, immediate)
    }

    /// Cancel a timer registered by `run_later`/`run_at_intervals`.
    pub fn cancel(&self, handle: EventHandle) -> bool {
        let mut guard = self.shared.lock();
        scheduler::cancel(&mut guard.events, handle)
    }

    /// Register `closure` against `signal`. Set `once` to unregister it
    /// automatically after its first notification.
    pub fn listen(&self, signal: u32, closure: Closure, once: bool) -> Option<NodeHandle> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        let handle = inner.events.acquire()?;
        inner.events.put(
            handle,
            Event::signal_listener_event(closure, SignalListenerState { signal, once, param: 0, listening: true }),
        );
        match inner.relay.listen(&mut inner.nodes, signal, handle) {
            Some(node) => Some(node),
            None => {
                inner.events.release(handle);
                None
            }
        }
    }

    /// `listen` with `once = true`.
    #[inline]
    pub fn listen_once(&self, signal: u32, closure: Closure) -> Option<NodeHandle> {
        self.listen(signal, closure, true)
    }

    /// Remove a listener registered by `listen`/`listen_once`.
    pub fn unlisten(&self, signal: u32, node: NodeHandle) {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        inner.relay.unlisten(&mut inner.nodes, &mut inner.events, signal, node);
    }

    /// Notify every listener on `signal` with `param`, queueing their
    /// closures for the next `tick()`. Returns the number notified.
    pub fn emit(&self, signal: u32, param: SignalParam) -> u32 {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        inner.relay.emit(&mut inner.nodes, &mut inner.events, &mut inner.ready, signal, param)
    }

    /// Advance host time to `new_time`. Intended to be called from the
    /// host's actual timer interrupt: this only ever writes the clock
    /// field, never walks `timers` or `schedule_queue`, so it is safe to
    /// call from interrupt context regardless of what `tick()` is doing
    /// concurrently in main context. Due timers are only collected and
    /// handed to the ready queue by `tick()` itself.
    pub fn on_timer_isr(&self, new_time: u32) {
        let mut guard = self.shared.lock();
        scheduler::update_timer(&mut guard.now, new_time);
    }

    /// Run every closure that was ready when this call started: newly
    /// due timers, newly queued plain closures, and signal listeners
    /// notified since the last `tick()`. Returns the number invoked.
    ///
    /// Each closure runs with the lock released, never held across user
    /// code: a closure is free to call back into this same `System` (to
    /// re-arm itself, emit a signal, enqueue follow-up work) without
    /// deadlocking or aliasing the pools this method is also touching.
    /// Only a bounded number of steps — the count of events ready when
    /// `tick()` was entered — are taken, so a closure that re-enqueues
    /// itself waits for the next `tick()` rather than running forever.
    pub fn tick(&self) -> u32 {
        {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            scheduler::manage_timers(
                &mut inner.events,
                &mut inner.nodes,
                &mut inner.timers,
                &mut inner.schedule_queue,
                &mut inner.ready,
                inner.now,
            );
        }

        let snapshot = self.shared.lock().ready.count();
        let mut processed = 0;
        for _ in 0..snapshot {
            let item = {
                let mut guard = self.shared.lock();
                let inner = &mut *guard;
                evloop::pop_ready(&mut inner.events, &mut inner.ready)
            };
            match item {
                Some(evloop::ReadyItem::Skipped) => continue,
                Some(evloop::ReadyItem::Run { handle, mut closure, retire }) => {
                    closure.invoke(handle);
                    processed += 1;
                    let mut guard = self.shared.lock();
                    evloop::finish_ready(&mut guard.events, handle, closure, retire);
                }
                None => break,
            }
        }
        processed
    }

    /// The host time last reported via `on_timer_isr`.
    pub fn now(&self) -> u32 {
        self.shared.lock().now
    }
}

impl<L: CriticalSection, const EV: usize, const ND: usize, const EQ: usize, const SQ: usize, const SW: usize> Default
    for System<L, EV, ND, EQ, SQ, SW>
{
    fn default() -> Self {
        Self::new()
    }
}
