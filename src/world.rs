//! World access: the node store the scheduler reads from and mutates.
//!
//! The harvest service never owns world state. It asks a [`NodeWorld`]
//! whether a target still exists, what an actor is aiming at, and finally to
//! remove the node. [`GridWorld`] is the in-memory implementation used by the
//! standalone server and the tests.

use crate::types::{ActorId, BlockPos, ItemStack, NodeCategory, Target};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

pub trait NodeWorld: Send + Sync {
    /// Is the actor still connected?
    fn is_online(&self, actor: &ActorId) -> bool;

    /// Does a node of the target's category still sit at its position?
    fn target_exists(&self, target: &Target) -> bool;

    /// Remove the node and return its nominal drops. A target that no longer
    /// exists yields nothing and changes nothing.
    fn remove_target(&self, target: &Target) -> Vec<ItemStack>;

    /// The node the actor is currently aiming at, if any.
    fn current_aim_target(&self, actor: &ActorId) -> Option<Target>;
}

// ---------------------------------------------------------------------------
// Grid world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GridState {
    nodes: HashMap<BlockPos, NodeCategory>,
    online: HashSet<ActorId>,
    aims: HashMap<ActorId, BlockPos>,
    drops: HashMap<NodeCategory, Vec<ItemStack>>,
}

/// Sparse grid of nodes plus the presence/aim data the monitor loop needs.
#[derive(Default)]
pub struct GridWorld {
    state: RwLock<GridState>,
}

impl GridWorld {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn place(&self, pos: BlockPos, category: impl Into<NodeCategory>) {
        self.state.write().nodes.insert(pos, category.into());
    }

    pub fn clear(&self, pos: BlockPos) -> Option<NodeCategory> {
        self.state.write().nodes.remove(&pos)
    }

    pub fn node_at(&self, pos: BlockPos) -> Option<NodeCategory> {
        self.state.read().nodes.get(&pos).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Nominal drops for a category. Categories without an entry drop one
    /// item named after themselves.
    pub fn set_drops(&self, category: impl Into<NodeCategory>, drops: Vec<ItemStack>) {
        self.state.write().drops.insert(category.into(), drops);
    }

    // -----------------------------------------------------------------------
    // Actors
    // -----------------------------------------------------------------------

    pub fn join(&self, actor: &ActorId) {
        self.state.write().online.insert(actor.clone());
    }

    pub fn leave(&self, actor: &ActorId) {
        let mut state = self.state.write();
        state.online.remove(actor);
        state.aims.remove(actor);
    }

    pub fn aim(&self, actor: &ActorId, pos: BlockPos) {
        self.state.write().aims.insert(actor.clone(), pos);
    }

    pub fn clear_aim(&self, actor: &ActorId) {
        self.state.write().aims.remove(actor);
    }
}

impl NodeWorld for GridWorld {
    fn is_online(&self, actor: &ActorId) -> bool {
        self.state.read().online.contains(actor)
    }

    fn target_exists(&self, target: &Target) -> bool {
        self.state
            .read()
            .nodes
            .get(&target.pos)
            .is_some_and(|category| category == &target.category)
    }

    fn remove_target(&self, target: &Target) -> Vec<ItemStack> {
        let mut state = self.state.write();
        if state.nodes.get(&target.pos) != Some(&target.category) {
            return Vec::new();
        }
        state.nodes.remove(&target.pos);

        state
            .drops
            .get(&target.category)
            .cloned()
            .unwrap_or_else(|| vec![ItemStack::new(target.category.as_str(), 1)])
    }

    fn current_aim_target(&self, actor: &ActorId) -> Option<Target> {
        let state = self.state.read();
        let pos = *state.aims.get(actor)?;
        let category = state.nodes.get(&pos)?.clone();
        Some(Target { pos, category })
    }
}
