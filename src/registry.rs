//! Operation registry: the single source of truth for "does actor X have an
//! active operation".
//!
//! Holds zero or one [`Operation`] per actor. Loops and signal handlers go
//! through [`OperationRegistry::begin`] / [`OperationRegistry::end`] rather
//! than holding operations of their own.

use crate::operation::{CancelReason, Operation};
use crate::types::{ActorId, Target};
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Result of [`OperationRegistry::begin`].
#[derive(Debug)]
pub enum Begin {
    /// The operation was registered; no other operation existed.
    Registered,
    /// An active operation for the same actor and target already exists.
    /// Nothing changed.
    Duplicate,
    /// The actor's previous operation (on another target) was cancelled as
    /// [`CancelReason::Superseded`] and replaced. The caller finishes its
    /// teardown.
    Replaced(Operation),
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<ActorId, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Would `begin(actor, target)` be a duplicate?
    pub fn is_duplicate(&self, actor: &ActorId, target: &Target) -> bool {
        self.operations
            .get(actor)
            .is_some_and(|op| op.is_active() && op.targets(target))
    }

    pub fn begin(&mut self, operation: Operation) -> Begin {
        match self.operations.entry(operation.actor().clone()) {
            Entry::Vacant(v) => {
                v.insert(operation);
                Begin::Registered
            }
            Entry::Occupied(mut o) => {
                let existing = o.get();
                if existing.is_active() && existing.targets(operation.target()) {
                    return Begin::Duplicate;
                }

                let mut previous = o.insert(operation);
                if previous.cancel(CancelReason::Superseded) {
                    debug!(
                        "Operation {} of {} superseded",
                        previous.animation_id(),
                        previous.actor()
                    );
                }
                Begin::Replaced(previous)
            }
        }
    }

    pub fn end(&mut self, actor: &ActorId) -> Option<Operation> {
        self.operations.remove(actor)
    }

    pub fn get(&self, actor: &ActorId) -> Option<&Operation> {
        self.operations.get(actor)
    }

    pub fn get_mut(&mut self, actor: &ActorId) -> Option<&mut Operation> {
        self.operations.get_mut(actor)
    }

    pub fn contains(&self, actor: &ActorId) -> bool {
        self.operations.contains_key(actor)
    }

    pub fn actors(&self) -> Vec<ActorId> {
        self.operations.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
