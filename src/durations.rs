//! Duration table: base break time per node category, and the speed scaling
//! law applied on top of it.
//!
//! Base values are ticks at speed 1.0 with no tool assistance, pre-computed
//! offline from the balancing sheet. The scaling law is the same one the
//! platform applies for clients with a native break-speed attribute, so both
//! kinds of client see the same timings.

use crate::types::{DurationOverride, HarvestConfig, NodeCategory, ResourceFamily, Tick};
use log::debug;
use std::collections::HashMap;

/// Built-in balancing data: `(category, base ticks, family)`.
const BUILTIN_DURATIONS: &[(&str, Tick, ResourceFamily)] = &[
    // Mining
    ("stone", 30, ResourceFamily::Mining),
    ("cobblestone", 40, ResourceFamily::Mining),
    ("andesite", 30, ResourceFamily::Mining),
    ("granite", 30, ResourceFamily::Mining),
    ("diorite", 30, ResourceFamily::Mining),
    ("deepslate", 60, ResourceFamily::Mining),
    ("coal_ore", 60, ResourceFamily::Mining),
    ("copper_ore", 60, ResourceFamily::Mining),
    ("iron_ore", 60, ResourceFamily::Mining),
    ("gold_ore", 60, ResourceFamily::Mining),
    ("redstone_ore", 60, ResourceFamily::Mining),
    ("lapis_ore", 60, ResourceFamily::Mining),
    ("diamond_ore", 60, ResourceFamily::Mining),
    ("emerald_ore", 60, ResourceFamily::Mining),
    ("deepslate_iron_ore", 90, ResourceFamily::Mining),
    ("deepslate_diamond_ore", 90, ResourceFamily::Mining),
    ("nether_quartz_ore", 60, ResourceFamily::Mining),
    ("ancient_debris", 600, ResourceFamily::Mining),
    ("obsidian", 600, ResourceFamily::Mining),
    // Woodcutting
    ("oak_log", 60, ResourceFamily::Woodcutting),
    ("birch_log", 60, ResourceFamily::Woodcutting),
    ("spruce_log", 60, ResourceFamily::Woodcutting),
    ("jungle_log", 60, ResourceFamily::Woodcutting),
    ("acacia_log", 60, ResourceFamily::Woodcutting),
    ("dark_oak_log", 60, ResourceFamily::Woodcutting),
    ("mangrove_log", 60, ResourceFamily::Woodcutting),
    ("cherry_log", 60, ResourceFamily::Woodcutting),
    // Excavation
    ("dirt", 15, ResourceFamily::Excavation),
    ("grass_block", 18, ResourceFamily::Excavation),
    ("sand", 15, ResourceFamily::Excavation),
    ("red_sand", 15, ResourceFamily::Excavation),
    ("gravel", 18, ResourceFamily::Excavation),
    ("clay", 18, ResourceFamily::Excavation),
    ("soul_sand", 15, ResourceFamily::Excavation),
    ("mycelium", 18, ResourceFamily::Excavation),
    ("snow_block", 6, ResourceFamily::Excavation),
    // Herbalism
    ("wheat", 1, ResourceFamily::Herbalism),
    ("carrots", 1, ResourceFamily::Herbalism),
    ("potatoes", 1, ResourceFamily::Herbalism),
    ("beetroots", 1, ResourceFamily::Herbalism),
    ("melon", 30, ResourceFamily::Herbalism),
    ("pumpkin", 30, ResourceFamily::Herbalism),
    ("sugar_cane", 1, ResourceFamily::Herbalism),
    ("cactus", 12, ResourceFamily::Herbalism),
];

/// Longest break any speed stat can produce (about 6.8 years at 20 Hz).
pub const MAX_DURATION_TICKS: Tick = u32::MAX as Tick;

/// Family assigned to categories that fall back to the default entry.
const DEFAULT_FAMILY: ResourceFamily = ResourceFamily::Mining;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationEntry {
    pub base_ticks: Tick,
    pub family: ResourceFamily,
}

/// Immutable category → duration lookup with a conservative default.
#[derive(Debug, Clone)]
pub struct DurationTable {
    entries: HashMap<NodeCategory, DurationEntry>,
    default_entry: DurationEntry,
}

impl DurationTable {
    /// An empty table; every lookup resolves to the default entry.
    pub fn new(default_ticks: Tick) -> Self {
        Self {
            entries: HashMap::new(),
            default_entry: DurationEntry {
                base_ticks: default_ticks.max(1),
                family: DEFAULT_FAMILY,
            },
        }
    }

    /// The built-in balancing table.
    pub fn builtin(default_ticks: Tick) -> Self {
        let mut table = Self::new(default_ticks);
        for (name, ticks, family) in BUILTIN_DURATIONS {
            table.insert(NodeCategory::new(*name), *ticks, *family);
        }
        table
    }

    /// Built-in table with the config's default and overrides applied.
    pub fn from_config(config: &HarvestConfig) -> Self {
        let mut table = Self::builtin(config.default_duration_ticks);
        table.apply_overrides(&config.durations);
        table
    }

    pub fn apply_overrides(&mut self, overrides: &HashMap<String, DurationOverride>) {
        for (name, entry) in overrides {
            self.insert(NodeCategory::new(name.as_str()), entry.ticks, entry.family);
        }
    }

    pub fn insert(&mut self, category: NodeCategory, base_ticks: Tick, family: ResourceFamily) {
        self.entries.insert(
            category,
            DurationEntry {
                base_ticks: base_ticks.max(1),
                family,
            },
        );
    }

    pub fn entry(&self, category: &NodeCategory) -> DurationEntry {
        match self.entries.get(category) {
            Some(entry) => *entry,
            None => {
                debug!(
                    "No duration entry for '{}', using default {} ticks",
                    category, self.default_entry.base_ticks
                );
                self.default_entry
            }
        }
    }

    pub fn base_duration(&self, category: &NodeCategory) -> Tick {
        self.entry(category).base_ticks
    }

    pub fn family(&self, category: &NodeCategory) -> ResourceFamily {
        self.entry(category).family
    }

    /// Total break time for an actor with the given speed stat.
    pub fn total_duration(&self, category: &NodeCategory, speed: f64) -> Tick {
        scale_duration(self.base_duration(category), speed)
    }

    pub fn contains(&self, category: &NodeCategory) -> bool {
        self.entries.contains_key(category)
    }

    pub fn default_ticks(&self) -> Tick {
        self.default_entry.base_ticks
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `max(1, base / speed)`, rounded to the nearest tick and capped at
/// [`MAX_DURATION_TICKS`].
///
/// A quotient that is not finite (speed 0 or NaN) keeps the base duration.
pub fn scale_duration(base: Tick, speed: f64) -> Tick {
    let scaled = base as f64 / speed;
    if !scaled.is_finite() {
        return base.clamp(1, MAX_DURATION_TICKS);
    }
    if scaled < 1.0 {
        return 1;
    }
    if scaled >= MAX_DURATION_TICKS as f64 {
        return MAX_DURATION_TICKS;
    }
    scaled.round() as Tick
}
