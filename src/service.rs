//! HarvestService – drives every break operation on the cooperative tick
//! scheduler: start checks, monitor/visual/completion loops, teardown and
//! yield resolution.

use crate::config::validate;
use crate::cooldown::ReentryCooldown;
use crate::durations::DurationTable;
use crate::error::{DeliveryError, HarvestError, Result};
use crate::gate::GateCheck;
use crate::liveness::LivenessTracker;
use crate::operation::{CancelReason, Operation, OperationTiming, OperationView};
use crate::protocol::{NodeHarvested, OperationCancelled};
use crate::registry::{Begin, OperationRegistry};
use crate::scheduler::{LoopKind, LoopTask, TickScheduler};
use crate::sink::ProgressSink;
use crate::stats::StatSource;
use crate::types::{ActorId, AnimationId, HarvestConfig, HarvestStats, Target, Tick};
use crate::world::NodeWorld;
use crate::yields::YieldRoll;
use log::{debug, error, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The external subsystems the scheduler consults.
#[derive(Clone)]
pub struct Collaborators {
    pub world: Arc<dyn NodeWorld>,
    pub stats: Arc<dyn StatSource>,
    pub gate: Arc<dyn GateCheck>,
    pub sink: Arc<dyn ProgressSink>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What happened to a begin signal. Only `Started` creates state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    Started {
        animation_id: AnimationId,
        total_ticks: Tick,
        /// The actor's previous operation, cancelled because the target changed.
        replaced: Option<AnimationId>,
    },
    /// Same actor, same target, already breaking.
    Duplicate,
    /// Inside the re-entry window after a completion.
    CoolingDown,
    /// The gate check said no; the actor was told why.
    Denied,
    /// The node is not there (or not of that category).
    TargetMissing,
}

/// Outcomes produced by a single [`HarvestService::tick`] call, plus any
/// cancellations triggered by signals since the previous tick.
///
/// Callers (typically [`HarvestBusAgent`](crate::bus::HarvestBusAgent))
/// publish these to the bus.
#[derive(Debug, Default)]
pub struct TickEvents {
    /// The tick counter that produced this set of events.
    pub tick: Tick,
    pub harvested: Vec<NodeHarvested>,
    pub cancelled: Vec<OperationCancelled>,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct HarvestService {
    config: HarvestConfig,
    durations: DurationTable,
    liveness: LivenessTracker,
    registry: OperationRegistry,
    cooldown: ReentryCooldown,
    scheduler: TickScheduler,
    collab: Collaborators,
    rng: StdRng,
    next_animation: u64,
    completed: u64,
    cancelled: u64,
    pending_cancelled: Vec<OperationCancelled>,
}

impl HarvestService {
    pub fn new(
        config: HarvestConfig,
        durations: DurationTable,
        collab: Collaborators,
    ) -> Result<Self> {
        validate(&config)?;

        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            cooldown: ReentryCooldown::new(config.reentry_cooldown_ticks),
            config,
            durations,
            liveness: LivenessTracker::new(),
            registry: OperationRegistry::new(),
            scheduler: TickScheduler::new(),
            collab,
            rng,
            next_animation: 1,
            completed: 0,
            cancelled: 0,
            pending_cancelled: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    /// An actor began a destructive interaction with `target`.
    pub fn begin_interaction(&mut self, actor: &ActorId, target: Target) -> BeginOutcome {
        let now = self.scheduler.now();

        if self.cooldown.is_cooling(actor, now) {
            debug!("Ignoring begin from {} during re-entry cooldown", actor);
            return BeginOutcome::CoolingDown;
        }

        if self.registry.is_duplicate(actor, &target) {
            return BeginOutcome::Duplicate;
        }

        if !self.collab.world.target_exists(&target) {
            debug!("Ignoring begin from {} on missing {}", actor, target);
            return BeginOutcome::TargetMissing;
        }

        if !self.collab.gate.can_interact(actor, &target.category) {
            let message = self.collab.gate.denial_message(actor, &target.category);
            debug!("{} denied on {}: {}", actor, target, message);
            report_delivery("denial notice", self.collab.sink.notify(actor, &message));
            return BeginOutcome::Denied;
        }

        let speed = self.collab.stats.speed(actor);
        let total_ticks = self.durations.total_duration(&target.category, speed);
        let timing = OperationTiming::new(
            now,
            total_ticks,
            self.config.visual.stage_count,
            self.config.visual.pace,
        );
        let animation_id = self.allocate_animation_id();

        let operation = Operation::new(actor.clone(), target.clone(), animation_id, timing);
        let replaced = match self.registry.begin(operation) {
            Begin::Registered => None,
            Begin::Duplicate => return BeginOutcome::Duplicate,
            Begin::Replaced(previous) => {
                let previous_id = previous.animation_id();
                self.teardown(&previous);
                self.record_cancel(&previous, CancelReason::Superseded);
                Some(previous_id)
            }
        };

        self.liveness.record_signal(actor, now);

        self.scheduler.schedule_in(
            self.config.monitor_interval_ticks,
            LoopKind::Monitor,
            actor,
            animation_id,
        );
        self.scheduler
            .schedule_in(timing.stage_interval, LoopKind::Visual, actor, animation_id);
        self.scheduler
            .schedule_in(timing.total_ticks, LoopKind::Completion, actor, animation_id);

        debug!(
            "{} started {} on {} ({} ticks at speed {:.2}, stage every {} ticks)",
            actor, animation_id, target, total_ticks, speed, timing.stage_interval
        );

        BeginOutcome::Started {
            animation_id,
            total_ticks,
            replaced,
        }
    }

    /// Continued-action signal. Ignored unless the actor is breaking
    /// something. Returns whether it was recorded.
    pub fn on_continued_action(&mut self, actor: &ActorId) -> bool {
        if !self.registry.contains(actor) {
            return false;
        }
        self.liveness.record_signal(actor, self.scheduler.now());
        true
    }

    /// Explicit stop from the client.
    pub fn abort(&mut self, actor: &ActorId) -> bool {
        self.cancel_active(actor, CancelReason::Aborted)
    }

    /// The actor left: cancel whatever it was doing and forget it.
    pub fn actor_disconnected(&mut self, actor: &ActorId) {
        self.cancel_active(actor, CancelReason::Disconnected);
        self.liveness.clear(actor);
        self.cooldown.clear(actor);
    }

    /// Cancel every live operation. Returns the cancellations.
    pub fn shutdown(&mut self) -> Vec<OperationCancelled> {
        for actor in self.registry.actors() {
            self.cancel_active(&actor, CancelReason::Shutdown);
        }
        std::mem::take(&mut self.pending_cancelled)
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    /// Advance the scheduler by one tick and run every loop task now due.
    pub fn tick(&mut self) -> TickEvents {
        let tasks = self.scheduler.advance();
        let now = self.scheduler.now();

        let mut events = TickEvents {
            tick: now,
            ..Default::default()
        };

        for task in tasks {
            self.run_task(task, &mut events);
        }

        self.cooldown.prune(now);
        events.cancelled = std::mem::take(&mut self.pending_cancelled);
        events
    }

    fn run_task(&mut self, task: LoopTask, events: &mut TickEvents) {
        let Some(operation) = self.registry.get(&task.actor) else {
            debug!("Dropping {:?} task for {}: no operation", task.kind, task.actor);
            return;
        };

        if operation.animation_id() != task.animation_id {
            let err = HarvestError::RegistryMismatch {
                actor: task.actor.clone(),
                expected: task.animation_id,
                found: operation.animation_id(),
            };
            error!("{}", err);
            return;
        }

        if !operation.is_active() {
            return;
        }

        match task.kind {
            LoopKind::Monitor => self.run_monitor(&task.actor, task.animation_id),
            LoopKind::Visual => self.run_visual(&task.actor, task.animation_id),
            LoopKind::Completion => self.run_completion(&task.actor, events),
        }
    }

    /// Liveness gate. Any failed check cancels; otherwise look again next
    /// interval.
    fn run_monitor(&mut self, actor: &ActorId, animation_id: AnimationId) {
        let Some(target) = self.registry.get(actor).map(|op| op.target().clone()) else {
            return;
        };

        match self.cancel_condition(actor, &target) {
            Some(reason) => {
                self.cancel_active(actor, reason);
            }
            None => self.scheduler.schedule_in(
                self.config.monitor_interval_ticks,
                LoopKind::Monitor,
                actor,
                animation_id,
            ),
        }
    }

    /// First failed check for a running operation, in monitor order:
    /// online, liveness, target, aim.
    fn cancel_condition(&self, actor: &ActorId, target: &Target) -> Option<CancelReason> {
        let now = self.scheduler.now();
        let world = &self.collab.world;

        if !world.is_online(actor) {
            Some(CancelReason::Disconnected)
        } else if self
            .liveness
            .is_stale(actor, now, self.config.liveness_timeout_ticks)
        {
            Some(CancelReason::Stale)
        } else if !world.target_exists(target) {
            Some(CancelReason::TargetVanished)
        } else if world.current_aim_target(actor).as_ref() != Some(target) {
            Some(CancelReason::AimChanged)
        } else {
            None
        }
    }

    /// Show the next break stage. Stops rescheduling after the last stage;
    /// completion stays with the timer.
    fn run_visual(&mut self, actor: &ActorId, animation_id: AnimationId) {
        let Some(operation) = self.registry.get_mut(actor) else {
            return;
        };
        let Some(stage) = operation.advance_stage() else {
            return;
        };

        let timing = operation.timing();
        let more = operation.stages_remaining();
        let target = operation.target().clone();

        report_delivery(
            "progress",
            self.collab.sink.emit_progress(
                actor,
                animation_id,
                &target,
                stage,
                timing.stage_count,
            ),
        );

        if more {
            self.scheduler
                .schedule_in(timing.stage_interval, LoopKind::Visual, actor, animation_id);
        }
    }

    /// The authoritative timer: remove the node and resolve the yield.
    ///
    /// The monitor may not have run this tick, so its checks are repeated
    /// here; a failure cancels instead of completing.
    fn run_completion(&mut self, actor: &ActorId, events: &mut TickEvents) {
        let Some(target) = self.registry.get(actor).map(|op| op.target().clone()) else {
            return;
        };
        if let Some(reason) = self.cancel_condition(actor, &target) {
            self.cancel_active(actor, reason);
            return;
        }

        let Some(operation) = self.registry.get_mut(actor) else {
            return;
        };
        if !operation.complete() {
            return;
        }
        let Some(operation) = self.registry.end(actor) else {
            return;
        };

        let now = self.scheduler.now();
        self.teardown(&operation);
        self.liveness.clear(actor);

        let target = operation.target();
        let nominal = self.collab.world.remove_target(target);
        let family = self.durations.family(&target.category);
        let multiplier = self.collab.stats.yield_multiplier(actor, family);
        let roll = YieldRoll::roll(multiplier, &mut self.rng);
        let drops = roll.apply_to(nominal);

        self.cooldown.arm(actor, now);
        self.completed += 1;

        debug!(
            "{} completed {} on {} (x{}, {} stacks)",
            actor,
            operation.animation_id(),
            target,
            roll.factor(),
            drops.len()
        );

        events.harvested.push(NodeHarvested {
            actor: actor.clone(),
            animation_id: operation.animation_id(),
            target: target.clone(),
            family,
            drops,
            factor: roll.factor(),
            tick: now,
        });
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Active → Cancelled for the actor's operation, with full teardown.
    /// `false` if there was nothing active to cancel.
    fn cancel_active(&mut self, actor: &ActorId, reason: CancelReason) -> bool {
        let Some(operation) = self.registry.get_mut(actor) else {
            return false;
        };
        if !operation.cancel(reason) {
            return false;
        }
        let Some(operation) = self.registry.end(actor) else {
            return false;
        };

        self.liveness.clear(actor);
        self.teardown(&operation);
        self.record_cancel(&operation, reason);
        true
    }

    /// Stop the loops and clear the break animation. Shared by both terminal
    /// transitions.
    fn teardown(&mut self, operation: &Operation) {
        self.scheduler.cancel(operation.animation_id());
        report_delivery(
            "progress clear",
            self.collab.sink.clear_progress(
                operation.actor(),
                operation.animation_id(),
                operation.target(),
            ),
        );
    }

    fn record_cancel(&mut self, operation: &Operation, reason: CancelReason) {
        debug!(
            "{} cancelled {} on {}: {}",
            operation.actor(),
            operation.animation_id(),
            operation.target(),
            reason
        );
        self.cancelled += 1;
        self.pending_cancelled.push(OperationCancelled {
            actor: operation.actor().clone(),
            animation_id: operation.animation_id(),
            target: operation.target().clone(),
            reason,
            tick: self.scheduler.now(),
        });
    }

    fn allocate_animation_id(&mut self) -> AnimationId {
        let id = AnimationId(self.next_animation);
        self.next_animation += 1;
        id
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn now(&self) -> Tick {
        self.scheduler.now()
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn durations(&self) -> &DurationTable {
        &self.durations
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    pub fn has_operation(&self, actor: &ActorId) -> bool {
        self.registry.contains(actor)
    }

    pub fn operation(&self, actor: &ActorId) -> Option<OperationView> {
        self.registry.get(actor).map(Operation::view)
    }

    pub fn operations(&self) -> Vec<OperationView> {
        self.registry.iter().map(Operation::view).collect()
    }

    pub fn is_liveness_tracked(&self, actor: &ActorId) -> bool {
        self.liveness.is_tracked(actor)
    }

    pub fn is_cooling_down(&self, actor: &ActorId) -> bool {
        self.cooldown.is_cooling(actor, self.scheduler.now())
    }

    pub fn stats(&self) -> HarvestStats {
        HarvestStats {
            active_operations: self.registry.len(),
            completed: self.completed,
            cancelled: self.cancelled,
            pending_tasks: self.scheduler.pending(),
            total_ticks: self.scheduler.now(),
        }
    }
}

/// Log a failed best-effort delivery. Never propagates.
fn report_delivery(what: &str, result: std::result::Result<(), DeliveryError>) {
    match result {
        Ok(()) => {}
        Err(e @ DeliveryError::NoSubscribers(_)) => debug!("Dropped {}: {}", what, e),
        Err(e) => warn!("Failed to deliver {}: {}", what, e),
    }
}
