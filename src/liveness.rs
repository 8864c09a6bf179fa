//! Liveness tracking for actors whose platform never reports "stopped
//! breaking".
//!
//! The only evidence that an actor is still breaking a node is a recurring
//! continued-action signal (arm swing). The tracker remembers the tick of the
//! last one; an operation is presumed abandoned once the gap reaches the
//! timeout. Missing data counts as abandoned.

use crate::types::{ActorId, Tick};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LivenessTracker {
    last_signal: HashMap<ActorId, Tick>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_signal(&mut self, actor: &ActorId, now: Tick) {
        match self.last_signal.get_mut(actor) {
            Some(last) => *last = (*last).max(now),
            None => {
                self.last_signal.insert(actor.clone(), now);
            }
        }
    }

    /// `true` when no signal arrived within `timeout` ticks of `now`, or when
    /// the actor has no record at all.
    pub fn is_stale(&self, actor: &ActorId, now: Tick, timeout: Tick) -> bool {
        match self.last_signal.get(actor) {
            Some(last) => now.saturating_sub(*last) >= timeout,
            None => true,
        }
    }

    pub fn last_signal(&self, actor: &ActorId) -> Option<Tick> {
        self.last_signal.get(actor).copied()
    }

    pub fn clear(&mut self, actor: &ActorId) -> bool {
        self.last_signal.remove(actor).is_some()
    }

    pub fn is_tracked(&self, actor: &ActorId) -> bool {
        self.last_signal.contains_key(actor)
    }

    pub fn len(&self) -> usize {
        self.last_signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_signal.is_empty()
    }
}
