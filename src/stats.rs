//! Stat source: break speed and per-family yield multipliers.

use crate::types::{ActorId, ResourceFamily};
use parking_lot::RwLock;
use std::collections::HashMap;

pub trait StatSource: Send + Sync {
    /// Break-speed stat; 1.0 is unassisted speed.
    fn speed(&self, actor: &ActorId) -> f64;

    /// Yield-multiplier stat for one resource family (0 = no bonus).
    fn yield_multiplier(&self, actor: &ActorId, family: ResourceFamily) -> f64;
}

#[derive(Debug, Clone, Default)]
struct ActorStats {
    speed: Option<f64>,
    multipliers: HashMap<ResourceFamily, f64>,
}

/// In-memory stats. Actors without an entry have speed 1.0 and multiplier 0.
#[derive(Default)]
pub struct StatTable {
    actors: RwLock<HashMap<ActorId, ActorStats>>,
}

impl StatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_speed(&self, actor: &ActorId, speed: f64) {
        self.actors
            .write()
            .entry(actor.clone())
            .or_default()
            .speed = Some(speed);
    }

    pub fn set_yield_multiplier(&self, actor: &ActorId, family: ResourceFamily, value: f64) {
        self.actors
            .write()
            .entry(actor.clone())
            .or_default()
            .multipliers
            .insert(family, value);
    }
}

impl StatSource for StatTable {
    fn speed(&self, actor: &ActorId) -> f64 {
        self.actors
            .read()
            .get(actor)
            .and_then(|stats| stats.speed)
            .unwrap_or(1.0)
    }

    fn yield_multiplier(&self, actor: &ActorId, family: ResourceFamily) -> f64 {
        self.actors
            .read()
            .get(actor)
            .and_then(|stats| stats.multipliers.get(&family).copied())
            .unwrap_or(0.0)
    }
}
