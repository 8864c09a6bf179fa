//! Operation: one actor's in-progress break of one node.
//!
//! ```text
//!            complete()
//!   Active ─────────────▶ Completed
//!     │
//!     └────── cancel() ──▶ Cancelled
//! ```
//!
//! Both terminal states are final. Every transition goes through
//! [`Operation::finish`], so tearing an operation down twice has no second
//! effect.
//!
//! While Active the operation owns three schedules on the shared
//! [`TickScheduler`](crate::scheduler::TickScheduler):
//!
//! | Loop       | Cadence                 | Job                                       |
//! |------------|-------------------------|-------------------------------------------|
//! | monitor    | `monitor_interval`      | liveness, aim, target checks → cancel     |
//! | visual     | `stage_interval`        | advance + broadcast the break stage       |
//! | completion | once at `total_ticks`   | finalize if still Active                  |

use crate::types::{ActorId, AnimationId, Target, Tick};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Active,
    Completed,
    Cancelled(CancelReason),
}

/// Why an operation was cancelled. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The actor went offline.
    Disconnected,
    /// No continued-action signal within the liveness timeout.
    Stale,
    /// The actor is aiming at something else.
    AimChanged,
    /// The node was removed or changed type underneath the operation.
    TargetVanished,
    /// The actor started breaking a different node.
    Superseded,
    /// The client explicitly reported that it stopped.
    Aborted,
    /// The service is shutting down.
    Shutdown,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CancelReason::Disconnected => "actor disconnected",
            CancelReason::Stale => "liveness timed out",
            CancelReason::AimChanged => "aim changed",
            CancelReason::TargetVanished => "target vanished",
            CancelReason::Superseded => "superseded by a new target",
            CancelReason::Aborted => "aborted by client",
            CancelReason::Shutdown => "service shutdown",
        };
        f.write_str(text)
    }
}

/// Timing fixed when the operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTiming {
    pub started_at: Tick,
    pub total_ticks: Tick,
    pub stage_count: u8,
    pub stage_interval: Tick,
}

impl OperationTiming {
    /// Spread `stage_count` stages over `total_ticks * pace`.
    pub fn new(started_at: Tick, total_ticks: Tick, stage_count: u8, pace: f64) -> Self {
        let total_ticks = total_ticks.max(1);
        let stage_count = stage_count.max(1);
        let span = total_ticks as f64 * pace;
        let raw_interval = span / f64::from(stage_count);
        let stage_interval = if raw_interval.is_finite() && raw_interval >= 1.0 {
            raw_interval.round() as Tick
        } else {
            1
        };

        Self {
            started_at,
            total_ticks,
            stage_count,
            stage_interval,
        }
    }

    pub fn completes_at(&self) -> Tick {
        self.started_at.saturating_add(self.total_ticks)
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    actor: ActorId,
    target: Target,
    animation_id: AnimationId,
    timing: OperationTiming,
    stage: u8,
    state: OperationState,
}

impl Operation {
    pub fn new(
        actor: ActorId,
        target: Target,
        animation_id: AnimationId,
        timing: OperationTiming,
    ) -> Self {
        Self {
            actor,
            target,
            animation_id,
            timing,
            stage: 0,
            state: OperationState::Active,
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn animation_id(&self) -> AnimationId {
        self.animation_id
    }

    pub fn timing(&self) -> OperationTiming {
        self.timing
    }

    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == OperationState::Active
    }

    pub fn targets(&self, target: &Target) -> bool {
        &self.target == target
    }

    /// Advance the visual stage. Returns the new stage, or `None` once the
    /// last stage has been shown or the operation is no longer Active.
    pub fn advance_stage(&mut self) -> Option<u8> {
        if !self.is_active() || self.stage >= self.timing.stage_count {
            return None;
        }
        self.stage += 1;
        Some(self.stage)
    }

    pub fn stages_remaining(&self) -> bool {
        self.is_active() && self.stage < self.timing.stage_count
    }

    /// Active → Completed. `false` if already terminal.
    pub fn complete(&mut self) -> bool {
        self.finish(OperationState::Completed)
    }

    /// Active → Cancelled. `false` if already terminal.
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        self.finish(OperationState::Cancelled(reason))
    }

    fn finish(&mut self, terminal: OperationState) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = terminal;
        true
    }

    pub fn view(&self) -> OperationView {
        OperationView {
            actor: self.actor.clone(),
            target: self.target.clone(),
            animation_id: self.animation_id,
            started_at: self.timing.started_at,
            total_ticks: self.timing.total_ticks,
            completes_at: self.timing.completes_at(),
            stage: self.stage,
            stage_count: self.timing.stage_count,
            state: self.state,
        }
    }
}

/// Read-only snapshot of an operation, for diagnostics and the stats command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationView {
    pub actor: ActorId,
    pub target: Target,
    pub animation_id: AnimationId,
    pub started_at: Tick,
    pub total_ticks: Tick,
    pub completes_at: Tick,
    pub stage: u8,
    pub stage_count: u8,
    pub state: OperationState,
}
