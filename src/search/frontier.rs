use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::position::PositionId;

/// Min-heap of pending positions. Duplicates are allowed; stale entries are
/// discarded by the caller when popped. Equal priorities pop the smaller id first.
#[derive(Debug, Default)]
pub struct PriorityFrontier {
    heap: BinaryHeap<Reverse<(u32, PositionId)>>,
}

impl PriorityFrontier {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { heap: BinaryHeap::with_capacity(capacity) }
    }

    pub fn push(&mut self, priority: u32, pos: PositionId) {
        self.heap.push(Reverse((priority, pos)));
    }

    pub fn pop(&mut self) -> Option<PositionId> {
        self.heap.pop().map(|Reverse((_, pos))| pos)
    }

    pub fn is_empty(&self) -> bool { self.heap.is_empty() }

    pub fn len(&self) -> usize { self.heap.len() }
}
