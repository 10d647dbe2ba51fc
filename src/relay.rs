//! Signal relay: named broadcast channels that fan a single `emit` out to
//! every registered listener.
//!
//! Grounded on `slopos_lib::waitqueue::WaitQueue`'s wake-all semantics,
//! generalized from "wake sleeping tasks" to "run every listener's
//! closure", and on the listener-list-per-signal shape implied by §4.9.
//! Listener storage is a [`ListHead`] per signal slot, all sharing the
//! node pool the host [`crate::system::System`] already owns for its timer
//! list — no extra static array of per-signal lists worth of spare nodes.

use crate::event::{Event, EventHandle, SignalParam};
use crate::llist::{ListHead, Node, NodeHandle};
use crate::pool::ObjectPool;
use crate::queue::CircularQueue;

/// Up to `W` independently addressable signal slots, each with its own
/// listener list.
pub struct SignalRelay<const W: usize> {
    listeners: [ListHead; W],
}

impl<const W: usize> SignalRelay<W> {
    #[inline]
    pub const fn new() -> Self {
        Self {
            listeners: [ListHead::new(); W],
        }
    }

    #[inline]
    fn slot(signal: u32) -> usize {
        signal as usize % W
    }

    /// Register `event` (already built as a
    /// [`crate::event::EventKind::SignalListener`]) against `signal`.
    /// Returns the node handle so the caller can `unlisten` it later, or
    /// `None` if the node pool is exhausted.
    pub fn listen<const ND: usize>(
        &mut self,
        nodes: &mut ObjectPool<Node, ND>,
        signal: u32,
        event: EventHandle,
    ) -> Option<NodeHandle> {
        self.listeners[Self::slot(signal)].push_tail(nodes, event)
    }

    /// Mark a previously registered listener as no longer listening.
    ///
    /// Does not touch the listener list or release the event slot: a node
    /// that was just handed to `emit` and is currently sitting in the
    /// ready-to-run queue must still be free to run once, per §5's
    /// unlisten-race guarantee, so `unlisten` cannot safely reach into
    /// either structure itself. The node is swept out of the list the next
    /// time its signal is emitted (see `emit`); the run loop's dispatch
    /// releases the event if it was already queued when `unlisten` ran.
    /// Idempotent: calling this twice on the same listener is a no-op the
    /// second time.
    pub fn unlisten<const ND: usize, const EV: usize>(
        &mut self,
        nodes: &ObjectPool<Node, ND>,
        events: &mut ObjectPool<Event, EV>,
        signal: u32,
        node: NodeHandle,
    ) {
        let payload = self.listeners[Self::slot(signal)].peek_node(nodes, node);
        if let Some(state) = unsafe { events.get_mut(payload) }.listener_state_mut() {
            state.listening = false;
        }
    }

    /// Deliver `param` to every still-listening listener on `signal`,
    /// enqueueing each one's closure onto `ready` for the next
    /// run-to-completion drain. A listener already marked non-listening
    /// (by `unlisten`, since its last visit) is skipped and removed from
    /// the list here instead — this is where a deferred `unlisten` is
    /// finally swept out. `once` listeners are unlinked from the listener
    /// list immediately after being notified (so a re-entrant `emit`
    /// during the same tick can never notify them twice); their event slot
    /// itself is released afterward by the run loop, once the queued
    /// closure has actually run.
    ///
    /// Returns the number of listeners notified. A still-listening
    /// listener whose closure could not be enqueued because `ready` is
    /// already full is skipped — it stays registered and is retried on
    /// the next `emit` — and is not counted; the caller is expected to log
    /// this via [`crate::log::log_warn`].
    pub fn emit<const ND: usize, const EV: usize, const EQ: usize>(
        &mut self,
        nodes: &mut ObjectPool<Node, ND>,
        events: &mut ObjectPool<Event, EV>,
        ready: &mut CircularQueue<EventHandle, EQ>,
        signal: u32,
        param: SignalParam,
    ) -> u32 {
        let slot = Self::slot(signal);

        // Snapshot listeners at entry: a listener registered by a closure
        // this same `emit` wakes must not be notified until the next
        // `emit`, matching the run loop's snapshot-at-entry semantics
        // (§4.8) applied to signal dispatch.
        let mut snapshot: [Option<(NodeHandle, EventHandle)>; 32] = [None; 32];
        let mut count = 0usize;
        self.listeners[slot].for_each_node(nodes, |node, payload| {
            if count < snapshot.len() {
                snapshot[count] = Some((node, payload));
                count += 1;
            }
        });

        let mut notified = 0;
        for entry in snapshot.into_iter().take(count) {
            let Some((node, payload)) = entry else { continue };
            let Some(state) = unsafe { events.get_mut(payload) }.listener_state_mut() else {
                continue;
            };
            if !state.listening {
                self.listeners[slot].remove(nodes, node);
                events.release(payload);
                continue;
            }
            state.param = param;
            let once = state.once;
            if !ready.push(payload) {
                continue;
            }
            notified += 1;
            if once {
                self.listeners[slot].remove(nodes, node);
            }
        }
        notified
    }
}

impl<const W: usize> Default for SignalRelay<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::Closure;
    use crate::event::{Event, SignalListenerState};

    fn noop(_ctx: *mut (), _params: EventHandle) -> i32 {
        0
    }

    fn make_listener<const EV: usize>(
        events: &mut ObjectPool<Event, EV>,
        signal: u32,
        once: bool,
    ) -> EventHandle {
        let handle = events.acquire().unwrap();
        events.put(
            handle,
            Event::signal_listener_event(
                Closure::new(noop, core::ptr::null_mut()),
                SignalListenerState { signal, once, param: 0, listening: true },
            ),
        );
        handle
    }

    #[test]
    fn emit_enqueues_every_listener_and_sets_param() {
        let mut events: ObjectPool<Event, 8> = ObjectPool::new();
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut ready: CircularQueue<EventHandle, 8> = CircularQueue::new(crate::handle::Handle::new(0));
        let mut relay: SignalRelay<4> = SignalRelay::new();

        let a = make_listener(&mut events, 1, false);
        let b = make_listener(&mut events, 1, false);
        relay.listen(&mut nodes, 1, a).unwrap();
        relay.listen(&mut nodes, 1, b).unwrap();

        let notified = relay.emit(&mut nodes, &mut events, &mut ready, 1, 99);
        assert_eq!(notified, 2);
        assert_eq!(ready.count(), 2);
        assert_eq!(unsafe { events.get(a) }.listener_state().unwrap().param, 99);
        assert_eq!(unsafe { events.get(b) }.listener_state().unwrap().param, 99);
    }

    #[test]
    fn once_listener_is_unregistered_after_emit() {
        let mut events: ObjectPool<Event, 8> = ObjectPool::new();
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut ready: CircularQueue<EventHandle, 8> = CircularQueue::new(crate::handle::Handle::new(0));
        let mut relay: SignalRelay<4> = SignalRelay::new();

        let a = make_listener(&mut events, 2, true);
        let node = relay.listen(&mut nodes, 2, a).unwrap();

        assert_eq!(relay.emit(&mut nodes, &mut events, &mut ready, 2, 1), 1);
        assert_eq!(relay.emit(&mut nodes, &mut events, &mut ready, 2, 1), 0);
        let _ = node;
    }

    #[test]
    fn unlisten_stops_future_notifications() {
        let mut events: ObjectPool<Event, 8> = ObjectPool::new();
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut ready: CircularQueue<EventHandle, 8> = CircularQueue::new(crate::handle::Handle::new(0));
        let mut relay: SignalRelay<4> = SignalRelay::new();

        let a = make_listener(&mut events, 3, false);
        let node = relay.listen(&mut nodes, 3, a).unwrap();
        relay.unlisten(&mut nodes, &mut events, 3, node);

        assert_eq!(relay.emit(&mut nodes, &mut events, &mut ready, 3, 0), 0);
    }

    #[test]
    fn unlisten_does_not_touch_the_list_or_pool_immediately() {
        let mut events: ObjectPool<Event, 8> = ObjectPool::new();
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut relay: SignalRelay<4> = SignalRelay::new();

        let a = make_listener(&mut events, 5, false);
        let node = relay.listen(&mut nodes, 5, a).unwrap();
        relay.unlisten(&mut nodes, &mut events, 5, node);

        assert_eq!(relay.listeners[SignalRelay::<4>::slot(5)].len(), 1, "unlisten must not unlink the node itself");
        assert_eq!(events.free_count(), 7, "unlisten must not release the event slot itself");
        assert!(!unsafe { events.get(a) }.listener_state().unwrap().listening);
    }

    #[test]
    fn unlisten_is_idempotent() {
        let mut events: ObjectPool<Event, 8> = ObjectPool::new();
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut relay: SignalRelay<4> = SignalRelay::new();

        let a = make_listener(&mut events, 6, false);
        let node = relay.listen(&mut nodes, 6, a).unwrap();
        relay.unlisten(&mut nodes, &mut events, 6, node);
        relay.unlisten(&mut nodes, &mut events, 6, node);

        assert!(!unsafe { events.get(a) }.listener_state().unwrap().listening);
    }

    #[test]
    fn emit_sweeps_a_stale_unlistened_node_out_of_the_list() {
        let mut events: ObjectPool<Event, 8> = ObjectPool::new();
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut ready: CircularQueue<EventHandle, 8> = CircularQueue::new(crate::handle::Handle::new(0));
        let mut relay: SignalRelay<4> = SignalRelay::new();

        let a = make_listener(&mut events, 7, false);
        let node = relay.listen(&mut nodes, 7, a).unwrap();
        relay.unlisten(&mut nodes, &mut events, 7, node);
        assert_eq!(relay.listeners[SignalRelay::<4>::slot(7)].len(), 1);

        assert_eq!(relay.emit(&mut nodes, &mut events, &mut ready, 7, 0), 0);
        assert_eq!(relay.listeners[SignalRelay::<4>::slot(7)].len(), 0);
        assert_eq!(events.free_count(), 8);
    }
}
