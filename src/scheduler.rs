//! Cooperative tick scheduler shared by every operation loop.
//!
//! Loops never block or sleep; they ask to "run again after N ticks" by
//! queueing a [`LoopTask`]. [`TickScheduler::advance`] moves the clock one
//! tick forward and hands back every task due at or before it, ordered by
//! `(due tick, loop kind, schedule order)`. Within one tick the monitor of an
//! operation therefore always runs before its visual emission.

use crate::types::{ActorId, AnimationId, Tick};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// The three per-operation loops, in their within-tick execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoopKind {
    Monitor,
    Visual,
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopTask {
    pub due: Tick,
    pub kind: LoopKind,
    pub actor: ActorId,
    pub animation_id: AnimationId,
    seq: u64,
}

impl PartialOrd for LoopTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoopTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Default)]
pub struct TickScheduler {
    queue: BinaryHeap<Reverse<LoopTask>>,
    now: Tick,
    next_seq: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    /// Queue `kind` for the given operation `delay` ticks from now
    /// (at least one tick ahead).
    pub fn schedule_in(
        &mut self,
        delay: Tick,
        kind: LoopKind,
        actor: &ActorId,
        animation_id: AnimationId,
    ) {
        let task = LoopTask {
            due: self.now.saturating_add(delay.max(1)),
            kind,
            actor: actor.clone(),
            animation_id,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.push(Reverse(task));
    }

    /// Advance the clock by one tick and drain every task now due.
    pub fn advance(&mut self) -> Vec<LoopTask> {
        self.now += 1;

        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.due > self.now {
                break;
            }
            if let Some(Reverse(task)) = self.queue.pop() {
                due.push(task);
            }
        }
        due
    }

    /// Drop every queued task of one operation. Returns how many were removed.
    pub fn cancel(&mut self, animation_id: AnimationId) -> usize {
        let before = self.queue.len();
        self.queue
            .retain(|Reverse(task)| task.animation_id != animation_id);
        before - self.queue.len()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_for(&self, animation_id: AnimationId) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(task)| task.animation_id == animation_id)
            .count()
    }
}
