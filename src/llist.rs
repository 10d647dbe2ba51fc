//! An intrusive, doubly-linked list of event handles, built over an
//! externally-owned node pool instead of raw pointers.
//!
//! Grounded on the arena+index recommendation in the source design notes:
//! nodes are [`Handle<Node>`] indices into a shared [`ObjectPool<Node, N>`],
//! not `Box`/`Rc` links, so any number of lists (the timer queue, every
//! signal's listener set) can share one pool of nodes the way
//! `slopos_lib::waitqueue::WaitQueue` keeps its waiters in fixed storage
//! rather than a heap-backed collection. A [`ListHead`] is just the
//! head/tail/len bookkeeping; every operation takes the pool it threads
//! through as an explicit argument, so one pool can back many independent
//! lists.

use crate::event::EventHandle;
use crate::handle::Handle;
use crate::pool::ObjectPool;

/// Handle to a list node.
pub type NodeHandle = Handle<Node>;

/// One link in a list: neighbor handles plus the event this node stands
/// for.
#[derive(Clone, Copy)]
pub struct Node {
    prev: Option<NodeHandle>,
    next: Option<NodeHandle>,
    pub payload: EventHandle,
}

/// Head/tail/length bookkeeping for one list threaded through a shared
/// `ObjectPool<Node, N>`.
#[derive(Clone, Copy)]
pub struct ListHead {
    head: Option<NodeHandle>,
    tail: Option<NodeHandle>,
    len: u32,
}

impl ListHead {
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `payload` at the front. Returns `None` if `pool` is
    /// exhausted.
    pub fn push_head<const N: usize>(
        &mut self,
        pool: &mut ObjectPool<Node, N>,
        payload: EventHandle,
    ) -> Option<NodeHandle> {
        let handle = pool.acquire()?;
        pool.put(
            handle,
            Node {
                prev: None,
                next: self.head,
                payload,
            },
        );
        if let Some(old_head) = self.head {
            unsafe { pool.get_mut(old_head) }.prev = Some(handle);
        } else {
            self.tail = Some(handle);
        }
        self.head = Some(handle);
        self.len += 1;
        Some(handle)
    }

    /// Insert `payload` at the back. Returns `None` if `pool` is
    /// exhausted.
    pub fn push_tail<const N: usize>(
        &mut self,
        pool: &mut ObjectPool<Node, N>,
        payload: EventHandle,
    ) -> Option<NodeHandle> {
        let handle = pool.acquire()?;
        pool.put(
            handle,
            Node {
                prev: self.tail,
                next: None,
                payload,
            },
        );
        if let Some(old_tail) = self.tail {
            unsafe { pool.get_mut(old_tail) }.next = Some(handle);
        } else {
            self.head = Some(handle);
        }
        self.tail = Some(handle);
        self.len += 1;
        Some(handle)
    }

    /// Insert `payload` immediately before the first node for which
    /// `before` returns `true`, or at the tail if none do. Used to keep the
    /// timer list ordered by due time with stable tie-breaking by insertion
    /// order (§4.5): a later-inserted timer with an equal due time never
    /// jumps ahead of one already queued.
    pub fn insert_sorted_by<const N: usize, F>(
        &mut self,
        pool: &mut ObjectPool<Node, N>,
        payload: EventHandle,
        mut before: F,
    ) -> Option<NodeHandle>
    where
        F: FnMut(EventHandle) -> bool,
    {
        let mut cursor = self.head;
        while let Some(node) = cursor {
            if before(unsafe { pool.get(node) }.payload) {
                return self.insert_before(pool, node, payload);
            }
            cursor = unsafe { pool.get(node) }.next;
        }
        self.push_tail(pool, payload)
    }

    fn insert_before<const N: usize>(
        &mut self,
        pool: &mut ObjectPool<Node, N>,
        node: NodeHandle,
        payload: EventHandle,
    ) -> Option<NodeHandle> {
        let prev = unsafe { pool.get(node) }.prev;
        let handle = pool.acquire()?;
        pool.put(
            handle,
            Node {
                prev,
                next: Some(node),
                payload,
            },
        );
        unsafe { pool.get_mut(node) }.prev = Some(handle);
        match prev {
            Some(prev) => unsafe { pool.get_mut(prev) }.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.len += 1;
        Some(handle)
    }

    /// Remove and return the head payload, or `None` if empty.
    pub fn pop_head<const N: usize>(&mut self, pool: &mut ObjectPool<Node, N>) -> Option<EventHandle> {
        let handle = self.head?;
        Some(self.remove(pool, handle))
    }

    /// Remove and return the tail payload, or `None` if empty.
    pub fn pop_tail<const N: usize>(&mut self, pool: &mut ObjectPool<Node, N>) -> Option<EventHandle> {
        let handle = self.tail?;
        Some(self.remove(pool, handle))
    }

    /// Peek the head payload without removing it.
    #[inline]
    pub fn peek_head<const N: usize>(&self, pool: &ObjectPool<Node, N>) -> Option<EventHandle> {
        self.head.map(|h| unsafe { pool.get(h) }.payload)
    }

    /// Look up the payload of a specific node without removing it. Caller
    /// must ensure `node` belongs to this list.
    #[inline]
    pub fn peek_node<const N: usize>(&self, pool: &ObjectPool<Node, N>, node: NodeHandle) -> EventHandle {
        unsafe { pool.get(node) }.payload
    }

    /// Unlink `node` and return its payload. Caller must ensure `node`
    /// belongs to this list and has not already been removed.
    pub fn remove<const N: usize>(
        &mut self,
        pool: &mut ObjectPool<Node, N>,
        node: NodeHandle,
    ) -> EventHandle {
        let Node { prev, next, payload } = *unsafe { pool.get(node) };
        match prev {
            Some(prev) => unsafe { pool.get_mut(prev) }.next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => unsafe { pool.get_mut(next) }.prev = prev,
            None => self.tail = prev,
        }
        pool.release(node);
        self.len -= 1;
        payload
    }

    /// Visit every payload head-to-tail. Must not mutate list linkage; use
    /// `remove`/`pop_head` in a follow-up pass for that.
    pub fn for_each<const N: usize, F: FnMut(EventHandle)>(
        &self,
        pool: &ObjectPool<Node, N>,
        mut f: F,
    ) {
        self.for_each_node(pool, |_, payload| f(payload))
    }

    /// Visit every `(node handle, payload)` pair head-to-tail. Must not
    /// mutate list linkage while iterating; collect the handles you need
    /// and act on them in a follow-up pass instead.
    pub fn for_each_node<const N: usize, F: FnMut(NodeHandle, EventHandle)>(
        &self,
        pool: &ObjectPool<Node, N>,
        mut f: F,
    ) {
        let mut cursor = self.head;
        while let Some(node) = cursor {
            let node_ref = unsafe { pool.get(node) };
            f(node, node_ref.payload);
            cursor = node_ref.next;
        }
    }
}

impl Default for ListHead {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::pool::ObjectPool as EventPool;

    fn handles(n: u32) -> ([EventHandle; 8], EventPool<Event, 8>) {
        let mut pool: EventPool<Event, 8> = EventPool::new();
        let mut out = [Handle::new(0); 8];
        for i in 0..n {
            out[i as usize] = pool.acquire().unwrap();
        }
        (out, pool)
    }

    #[test]
    fn push_tail_then_pop_head_is_fifo() {
        let (h, _events) = handles(3);
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut list = ListHead::new();
        list.push_tail(&mut nodes, h[0]);
        list.push_tail(&mut nodes, h[1]);
        list.push_tail(&mut nodes, h[2]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.pop_head(&mut nodes), Some(h[0]));
        assert_eq!(list.pop_head(&mut nodes), Some(h[1]));
        assert_eq!(list.pop_head(&mut nodes), Some(h[2]));
        assert!(list.is_empty());
    }

    #[test]
    fn remove_middle_relinks_neighbors() {
        let (h, _events) = handles(3);
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut list = ListHead::new();
        list.push_tail(&mut nodes, h[0]);
        let mid = list.push_tail(&mut nodes, h[1]).unwrap();
        list.push_tail(&mut nodes, h[2]);
        assert_eq!(list.remove(&mut nodes, mid), h[1]);
        assert_eq!(list.pop_head(&mut nodes), Some(h[0]));
        assert_eq!(list.pop_head(&mut nodes), Some(h[2]));
    }

    #[test]
    fn two_lists_share_one_pool() {
        let (h, _events) = handles(4);
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let mut a = ListHead::new();
        let mut b = ListHead::new();
        a.push_tail(&mut nodes, h[0]);
        b.push_tail(&mut nodes, h[1]);
        a.push_tail(&mut nodes, h[2]);
        b.push_tail(&mut nodes, h[3]);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert_eq!(a.pop_head(&mut nodes), Some(h[0]));
        assert_eq!(b.pop_head(&mut nodes), Some(h[1]));
    }

    #[test]
    fn insert_sorted_keeps_ascending_order_and_tie_order() {
        let (h, _events) = handles(4);
        let mut nodes: ObjectPool<Node, 8> = ObjectPool::new();
        let due = [30u32, 10, 10, 20];
        let mut list = ListHead::new();
        for i in 0..4 {
            let target = h[i];
            list.insert_sorted_by(&mut nodes, target, |existing| {
                let existing_idx = h.iter().position(|x| *x == existing).unwrap();
                due[existing_idx] > due[i]
            });
        }
        let mut order = [Handle::new(0); 4];
        let mut i = 0;
        list.for_each(&nodes, |payload| {
            order[i] = payload;
            i += 1;
        });
        assert_eq!(order, [h[1], h[2], h[3], h[0]]);
    }
}
