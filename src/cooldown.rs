//! Re-entry cooldown after a completed break.
//!
//! The signal source can emit a trailing "begin" for the node in the same
//! tick the node disappears. Begins from an actor inside the cooldown window
//! are dropped so they cannot spawn an operation against a vanishing target.

use crate::types::{ActorId, Tick};
use std::collections::HashMap;

#[derive(Debug)]
pub struct ReentryCooldown {
    window: Tick,
    armed_at: HashMap<ActorId, Tick>,
}

impl ReentryCooldown {
    pub fn new(window: Tick) -> Self {
        Self {
            window,
            armed_at: HashMap::new(),
        }
    }

    pub fn arm(&mut self, actor: &ActorId, now: Tick) {
        self.armed_at.insert(actor.clone(), now);
    }

    pub fn is_cooling(&self, actor: &ActorId, now: Tick) -> bool {
        self.armed_at
            .get(actor)
            .is_some_and(|armed| now.saturating_sub(*armed) < self.window)
    }

    pub fn clear(&mut self, actor: &ActorId) {
        self.armed_at.remove(actor);
    }

    /// Drop every entry whose window has elapsed.
    pub fn prune(&mut self, now: Tick) {
        let window = self.window;
        self.armed_at
            .retain(|_, armed| now.saturating_sub(*armed) < window);
    }

    pub fn window(&self) -> Tick {
        self.window
    }

    pub fn len(&self) -> usize {
        self.armed_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed_at.is_empty()
    }
}
