//! Unbounded FIFO shared between producers and the poll worker.

use crossbeam::queue::SegQueue;

/// Lock-free, insertion-ordered queue: producers append at the tail, the poll worker
/// takes from the head. No capacity bound.
pub struct DiscoveryQueue<T> {
    inner: SegQueue<T>,
}

impl<T> DiscoveryQueue<T> {
    pub fn new() -> Self { Self { inner: SegQueue::new() } }

    pub fn push_back(&self, item: T) { self.inner.push(item) }
    pub fn pop_front(&self) -> Option<T> { self.inner.pop() }

    /// Snapshot of the current length; may be stale as soon as it returns.
    pub fn len(&self) -> usize { self.inner.len() }
    pub fn is_empty(&self) -> bool { self.inner.is_empty() }
}

impl<T> Default for DiscoveryQueue<T> {
    fn default() -> Self { Self::new() }
}
