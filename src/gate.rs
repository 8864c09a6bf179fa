//! Gate checks: may this actor break this kind of node at all?
//!
//! Consulted once when an operation would start. A denial never creates an
//! operation and is reported to the actor with [`GateCheck::denial_message`].

use crate::types::{ActorId, NodeCategory, ResourceFamily};
use parking_lot::RwLock;
use std::collections::HashMap;

pub trait GateCheck: Send + Sync {
    fn can_interact(&self, actor: &ActorId, category: &NodeCategory) -> bool;

    /// User-facing text sent after `can_interact` returned `false`.
    fn denial_message(&self, _actor: &ActorId, category: &NodeCategory) -> String {
        format!("You can't break {} yet.", category)
    }
}

/// Gate that lets everyone break everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGate;

impl GateCheck for OpenGate {
    fn can_interact(&self, _actor: &ActorId, _category: &NodeCategory) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct Requirement {
    family: ResourceFamily,
    level: u32,
}

/// Skill-level gate: a category may require a minimum level in its family.
/// Categories without a requirement are open to everyone.
#[derive(Default)]
pub struct LevelGate {
    requirements: RwLock<HashMap<NodeCategory, Requirement>>,
    levels: RwLock<HashMap<(ActorId, ResourceFamily), u32>>,
}

impl LevelGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&self, category: impl Into<NodeCategory>, family: ResourceFamily, level: u32) {
        self.requirements
            .write()
            .insert(category.into(), Requirement { family, level });
    }

    pub fn set_level(&self, actor: &ActorId, family: ResourceFamily, level: u32) {
        self.levels.write().insert((actor.clone(), family), level);
    }

    pub fn level(&self, actor: &ActorId, family: ResourceFamily) -> u32 {
        self.levels
            .read()
            .get(&(actor.clone(), family))
            .copied()
            .unwrap_or(0)
    }
}

impl GateCheck for LevelGate {
    fn can_interact(&self, actor: &ActorId, category: &NodeCategory) -> bool {
        let Some(req) = self.requirements.read().get(category).copied() else {
            return true;
        };
        self.level(actor, req.family) >= req.level
    }

    fn denial_message(&self, _actor: &ActorId, category: &NodeCategory) -> String {
        match self.requirements.read().get(category) {
            Some(req) => format!(
                "You need level {} {} to break {}.",
                req.level, req.family, category
            ),
            None => format!("You can't break {} yet.", category),
        }
    }
}
