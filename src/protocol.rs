//! `harvest.*` wire protocol.
//!
//! This module owns **every message that crosses the bus boundary** between
//! the harvest service and its consumers (protocol translators, observers,
//! admin tooling).
//!
//! ## Channel namespaces
//!
//! | Namespace          | Direction        | Carried by                  |
//! |--------------------|------------------|-----------------------------|
//! | `harvest.*`        | server → client  | [`Frame`] on the broadcast  |
//! | [`InboundCommand`] | client → server  | command channel / stdin     |
//!
//! ## Design rules
//!
//! 1. Every struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. Every outbound event is wrapped in [`HarvestEvent`] (`session` + `frame`).
//! 3. Progress is sent as a stage index plus the stage count, never as a
//!    fraction of the real duration.

use crate::operation::{CancelReason, OperationView};
use crate::types::{
    ActorId, AnimationId, BlockPos, HarvestStats, ItemStack, ResourceFamily, Target, Tick,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Common envelope
// ---------------------------------------------------------------------------

/// Every outbound message is wrapped in this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestEvent<T> {
    pub session: String,
    pub frame: u64,
    pub payload: T,
}

impl<T> HarvestEvent<T> {
    pub fn new(session: impl Into<String>, frame: u64, payload: T) -> Self {
        Self {
            session: session.into(),
            frame,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress  (subjects: harvest.progress*)
// ---------------------------------------------------------------------------

/// A break stage advanced. Sent to the breaking actor and nearby observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub actor: ActorId,
    pub animation_id: AnimationId,
    pub target: Target,
    pub stage: u8,
    pub stage_count: u8,
}

/// The break animation must be removed (completion or cancellation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCleared {
    pub actor: ActorId,
    pub animation_id: AnimationId,
    pub target: Target,
}

// ---------------------------------------------------------------------------
// Outcomes  (subjects: harvest.node.*, harvest.operation.*)
// ---------------------------------------------------------------------------

/// A node was removed by a completed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHarvested {
    pub actor: ActorId,
    pub animation_id: AnimationId,
    pub target: Target,
    pub family: ResourceFamily,
    /// Drops after the yield multiplier was applied.
    pub drops: Vec<ItemStack>,
    /// Factor applied to the nominal drops.
    pub factor: u32,
    pub tick: Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCancelled {
    pub actor: ActorId,
    pub animation_id: AnimationId,
    pub target: Target,
    pub reason: CancelReason,
    pub tick: Tick,
}

/// User-facing message for one actor (gate denials).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorNotice {
    pub actor: ActorId,
    pub message: String,
}

/// Reply to [`InboundCommand::Stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReply {
    pub stats: HarvestStats,
    pub operations: Vec<OperationView>,
}

// ---------------------------------------------------------------------------
// Inbound commands
// ---------------------------------------------------------------------------

/// Everything the service accepts from the outside, one JSON object per
/// message, tagged by `cmd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum InboundCommand {
    ActorJoin {
        actor: ActorId,
    },
    ActorLeave {
        actor: ActorId,
    },
    /// The actor's crosshair moved onto a node position.
    Aim {
        actor: ActorId,
        pos: BlockPos,
    },
    ClearAim {
        actor: ActorId,
    },
    /// Destructive interaction began on the node at `pos`.
    BeginBreak {
        actor: ActorId,
        pos: BlockPos,
    },
    /// Continued-action signal (arm swing) from a breaking actor.
    ContinueBreak {
        actor: ActorId,
    },
    /// Explicit stop, for platforms that report one.
    AbortBreak {
        actor: ActorId,
    },
    PlaceNode {
        pos: BlockPos,
        category: String,
    },
    SetSpeed {
        actor: ActorId,
        speed: f64,
    },
    SetYieldMultiplier {
        actor: ActorId,
        family: ResourceFamily,
        value: f64,
    },
    Stats,
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One encoded outbound message, ready for any transport.
#[cfg(feature = "server")]
#[derive(Debug, Clone)]
pub struct Frame {
    pub subject: &'static str,
    pub payload: bytes::Bytes,
}

// ---------------------------------------------------------------------------
// Subject helpers
// ---------------------------------------------------------------------------

/// All bus subjects used by the harvest protocol, as constants.
pub mod subjects {
    pub const PROGRESS: &str = "harvest.progress";
    pub const PROGRESS_CLEARED: &str = "harvest.progress.cleared";

    pub const NODE_HARVESTED: &str = "harvest.node.harvested";
    pub const OPERATION_CANCELLED: &str = "harvest.operation.cancelled";

    pub const NOTICE: &str = "harvest.notice";
    pub const STATS: &str = "harvest.stats";
}
