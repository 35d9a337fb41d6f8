//! Deferred simulator effects.
//!
//! Some interactions split into an immediate command and a follow-up that
//! must fire at a later step (a ramped speed change ends with a hard
//! set-speed once the ramp completes).  Effects are kept in a min-heap keyed
//! by their grid-snapped due time and drained at each grant.  There is no
//! cancellation: a later command simply overrides the effect's outcome when
//! it fires.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use fed_core::{SimTime, VehicleId};

/// A command to replay against the simulator at a later grant.
#[derive(Clone, Debug, PartialEq)]
pub enum DeferredEffect {
    /// Pin the vehicle's speed, ending a ramp started by `slow_down`.
    SetSpeed { vehicle: VehicleId, speed: f64 },
}

#[derive(Clone, Debug)]
struct Entry {
    time: SimTime,
    /// Insertion sequence, so equal-time effects fire in schedule order.
    seq: u64,
    effect: DeferredEffect,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Entry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Entry) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

/// Min-heap of pending effects, fired at most once each.
#[derive(Default)]
pub struct DeferredEventScheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl DeferredEventScheduler {
    pub fn new() -> DeferredEventScheduler {
        DeferredEventScheduler::default()
    }

    /// Schedule `effect` to fire at the first grant at or after `time`.
    pub fn schedule(&mut self, time: SimTime, effect: DeferredEffect) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { time, seq, effect }));
    }

    /// Remove and return every effect due at or before `now`.
    pub fn drain_due(&mut self, now: SimTime) -> Vec<DeferredEffect> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.time > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.effect);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
