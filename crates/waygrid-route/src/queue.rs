//! The open set: a binary min-heap of node references keyed on `f`.

use std::collections::BinaryHeap;

/// Reference into a node buffer, ordered by `f` so the smallest pops
/// first. No stability among equal keys is guaranteed or needed.
#[derive(Copy, Clone, Eq, PartialEq)]
struct QueueEntry {
    f: u32,
    idx: u32,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse so BinaryHeap (a max-heap) pops the smallest f first.
        other.f.cmp(&self.f)
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A* open set over node indices.
#[derive(Default)]
pub struct OpenQueue {
    heap: BinaryHeap<QueueEntry>,
}

impl OpenQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, idx: u32, f: u32) {
        self.heap.push(QueueEntry { f, idx });
    }

    /// Pop the node index with the lowest `f`.
    #[inline]
    pub fn pop(&mut self) -> Option<u32> {
        self.heap.pop().map(|e| e.idx)
    }

    /// The lowest `f` currently queued.
    #[inline]
    pub fn peek_f(&self) -> Option<u32> {
        self.heap.peek().map(|e| e.f)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
