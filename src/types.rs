//! Core harvest types shared across all modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scheduler time, in server ticks.
pub type Tick = u64;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Stable identity of a participant that can break nodes.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique id attached to every progress broadcast of one operation.
///
/// Observers use it to tell overlapping break animations apart, and the
/// scheduler uses it to drop loop tasks that belong to a finished operation.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimationId(pub u64);

impl std::fmt::Display for AnimationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anim#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Integer world position of a destructible node.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

/// Material/type key of a node (e.g. `"stone"`, `"oak_log"`).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeCategory(pub String);

impl NodeCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeCategory {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource families track their yield multipliers (and skill levels)
/// independently of each other.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFamily {
    Mining,
    Woodcutting,
    Excavation,
    Herbalism,
}

impl std::fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceFamily::Mining => "Mining",
            ResourceFamily::Woodcutting => "Woodcutting",
            ResourceFamily::Excavation => "Excavation",
            ResourceFamily::Herbalism => "Herbalism",
        };
        f.write_str(name)
    }
}

/// A destructible node as seen by the scheduler: where it is and what it is.
///
/// Existence is owned by the world; two targets are the same node when both
/// position and category match.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub pos: BlockPos,
    pub category: NodeCategory,
}

impl Target {
    pub fn new(pos: BlockPos, category: impl Into<NodeCategory>) -> Self {
        Self {
            pos,
            category: category.into(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.category, self.pos)
    }
}

/// A quantity of one item produced by removing a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    pub active_operations: usize,
    pub completed: u64,
    pub cancelled: u64,
    pub pending_tasks: usize,
    pub total_ticks: u64,
}

/// Tuning of the progress broadcast, independent of the completion timer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisualConfig {
    /// Number of break stages shown to observers.
    pub stage_count: u8,
    /// Fraction of the total duration over which the stages are spread.
    /// `1.0` ends the last stage together with completion.
    pub pace: f64,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            stage_count: 10,
            pace: 1.0,
        }
    }
}

/// One entry of the configured duration table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationOverride {
    /// Duration in ticks at speed 1.0 with no tool assistance.
    pub ticks: u64,
    pub family: ResourceFamily,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarvestConfig {
    /// Scheduler tick rate in Hz.
    pub tick_rate_hz: f32,
    /// Maximum gap between continued-action signals before an operation is
    /// presumed abandoned.
    pub liveness_timeout_ticks: u64,
    /// Cadence of the monitor loop.
    pub monitor_interval_ticks: u64,
    /// Ticks after a completion during which new begin signals are ignored.
    pub reentry_cooldown_ticks: u64,
    pub visual: VisualConfig,
    /// Duration used for categories missing from the table.
    pub default_duration_ticks: u64,
    /// Entries added to (or replacing) the built-in duration table.
    pub durations: HashMap<String, DurationOverride>,
    /// Fixed seed for yield rolls; entropy when absent.
    pub rng_seed: Option<u64>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            liveness_timeout_ticks: 4,
            monitor_interval_ticks: 1,
            reentry_cooldown_ticks: 2,
            visual: VisualConfig::default(),
            default_duration_ticks: 60,
            durations: HashMap::new(),
            rng_seed: None,
        }
    }
}
