//! Janet Harvest Service
//!
//! Server-driven node destruction for clients that cannot apply a
//! break-speed attribute themselves. The server owns the whole lifecycle:
//! timing, break-stage feedback, liveness detection and yield resolution,
//! with the same timings natively supported clients get.
//!
//! ## Architecture
//!
//! ```text
//! HarvestBusAgent  (bus.rs)          ← inbound commands, tick loop, frames
//!   └── HarvestService  (service.rs) ← begin/continue/abort, tick()
//!         ├── DurationTable     (durations.rs)
//!         ├── OperationRegistry (registry.rs) ── Operation (operation.rs)
//!         ├── TickScheduler     (scheduler.rs) ← monitor / visual / completion
//!         ├── LivenessTracker   (liveness.rs)
//!         ├── ReentryCooldown   (cooldown.rs)
//!         ├── YieldRoll         (yields.rs)
//!         └── Collaborators: NodeWorld, StatSource, GateCheck, ProgressSink
//! ```
//!
//! Everything below the bus agent is synchronous and runs on one cooperative
//! scheduler; nothing blocks and no loop owns a thread.

// Protocol types are always available (no server feature needed).
pub mod protocol;
pub mod types;

pub mod config;
pub mod cooldown;
pub mod durations;
pub mod error;
pub mod gate;
pub mod liveness;
pub mod operation;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod sink;
pub mod stats;
pub mod world;
pub mod yields;

// The bus agent requires the `server` feature.
#[cfg(feature = "server")]
pub mod bus;

// Convenience re-exports
#[cfg(feature = "server")]
pub use bus::{ChannelSink, HarvestBusAgent, HarvestBusConfig, Publisher};
pub use durations::DurationTable;
pub use error::{DeliveryError, HarvestError};
pub use operation::{CancelReason, OperationState, OperationView};
pub use service::{BeginOutcome, Collaborators, HarvestService, TickEvents};
pub use types::{
    ActorId, AnimationId, BlockPos, HarvestConfig, HarvestStats, ItemStack, NodeCategory,
    ResourceFamily, Target, Tick,
};
