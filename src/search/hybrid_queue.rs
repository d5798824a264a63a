use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::position::PositionId;

/// FIFO queue with a side heap of delayed entries. A delayed entry joins the FIFO once
/// enough dequeues ("expansions") have happened; when the FIFO runs dry the earliest
/// delayed entry is released early.
#[derive(Debug, Default)]
pub struct HybridQueue {
    main: VecDeque<PositionId>,
    delayed: BinaryHeap<Reverse<(u64, u64, PositionId)>>,
    expansions: u64,
    seq: u64,
}

impl HybridQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { main: VecDeque::with_capacity(capacity), ..Self::default() }
    }

    pub fn enqueue(&mut self, pos: PositionId) {
        self.main.push_back(pos);
    }

    /// Makes `pos` available after `delay` more expansions.
    pub fn enqueue_delayed(&mut self, pos: PositionId, delay: u32) {
        let release = self.expansions + delay as u64;
        self.delayed.push(Reverse((release, self.seq, pos)));
        self.seq += 1;
    }

    pub fn dequeue(&mut self) -> Option<PositionId> {
        self.release_ready();
        if self.main.is_empty() {
            if let Some(Reverse((_, _, pos))) = self.delayed.pop() {
                self.main.push_back(pos);
            }
        }
        let pos = self.main.pop_front()?;
        self.expansions += 1;
        self.release_ready();
        Some(pos)
    }

    fn release_ready(&mut self) {
        while let Some(Reverse((release, _, pos))) = self.delayed.peek().copied() {
            if release > self.expansions {
                break;
            }
            self.delayed.pop();
            self.main.push_back(pos);
        }
    }

    /// Entries ready to dequeue now, delayed ones excluded.
    pub fn len(&self) -> usize { self.main.len() }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.delayed.is_empty()
    }
}

/// Release delay for a transport of `duration` ticks: `q·d + 6·(1+used)·d(d+1)/2`
/// with `d = 2·duration`, saturating at `u32::MAX`.
pub fn transport_delay(duration: u32, queue_len: usize, transports_used: u32) -> u32 {
    let d = duration as u64 * 2;
    if d == 0 {
        return 0;
    }
    let increment = 6u64.saturating_mul(1 + transports_used as u64);
    let part1 = (queue_len as u64).saturating_mul(d);
    let part2 = increment.saturating_mul(d.saturating_mul(d + 1) / 2);
    part1.saturating_add(part2).min(u32::MAX as u64) as u32
}
