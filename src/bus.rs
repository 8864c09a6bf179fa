//! Bus integration – HarvestBusAgent feeds inbound commands into
//! [`HarvestService`] and ticks it at a fixed rate.
//!
//! ## Event contract (inbound)
//!
//! | Command                | Payload keys          | Effect                          |
//! |------------------------|-----------------------|---------------------------------|
//! | `actor_join`           | actor                 | actor goes online               |
//! | `actor_leave`          | actor                 | `actor_disconnected`            |
//! | `aim` / `clear_aim`    | actor, pos            | updates the actor's aim         |
//! | `begin_break`          | actor, pos            | `begin_interaction`             |
//! | `continue_break`       | actor                 | `on_continued_action`           |
//! | `abort_break`          | actor                 | `abort`                         |
//! | `place_node`           | pos, category         | places a node in the grid world |
//! | `set_speed`            | actor, speed          | updates the speed stat          |
//! | `set_yield_multiplier` | actor, family, value  | updates a yield multiplier      |
//! | `stats`                | *(empty)*             | publishes a `StatsReply`        |
//!
//! ## Event contract (outbound)
//!
//! | Subject                        | Payload type                           |
//! |--------------------------------|----------------------------------------|
//! | `harvest.progress`             | `HarvestEvent<ProgressUpdate>`         |
//! | `harvest.progress.cleared`     | `HarvestEvent<ProgressCleared>`        |
//! | `harvest.node.harvested`       | `HarvestEvent<NodeHarvested>`          |
//! | `harvest.operation.cancelled`  | `HarvestEvent<OperationCancelled>`     |
//! | `harvest.notice`               | `HarvestEvent<ActorNotice>`            |
//! | `harvest.stats`                | `HarvestEvent<StatsReply>`             |

use crate::error::DeliveryError;
use crate::protocol::{
    subjects, ActorNotice, Frame, HarvestEvent, InboundCommand, ProgressCleared, ProgressUpdate,
    StatsReply,
};
use crate::service::{HarvestService, TickEvents};
use crate::sink::ProgressSink;
use crate::stats::StatTable;
use crate::types::{ActorId, AnimationId, NodeCategory, Target};
use crate::world::GridWorld;
use anyhow::Result;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

// ---------------------------------------------------------------------------
// Config for HarvestBusAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HarvestBusConfig {
    /// Session name stamped on every outbound event.
    pub session: String,
    /// Participant ID advertised in logs.
    pub participant_id: String,
    /// Tick rate in Hz.
    pub tick_rate_hz: f32,
}

impl Default for HarvestBusConfig {
    fn default() -> Self {
        Self {
            session: "default".into(),
            participant_id: "harvest-service".into(),
            tick_rate_hz: 20.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher / ChannelSink
// ---------------------------------------------------------------------------

/// Encodes events into [`Frame`]s and sends them on the outbound broadcast.
///
/// Cheap to clone; all clones share the frame counter.
#[derive(Clone)]
pub struct Publisher {
    session: String,
    frame: Arc<AtomicU64>,
    tx: broadcast::Sender<Frame>,
}

impl Publisher {
    pub fn new(session: impl Into<String>, tx: broadcast::Sender<Frame>) -> Self {
        Self {
            session: session.into(),
            frame: Arc::new(AtomicU64::new(0)),
            tx,
        }
    }

    pub fn set_frame(&self, frame: u64) {
        self.frame.store(frame, Ordering::Relaxed);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    pub fn publish<T: Serialize>(
        &self,
        subject: &'static str,
        payload: T,
    ) -> Result<(), DeliveryError> {
        let event = HarvestEvent::new(
            self.session.as_str(),
            self.frame.load(Ordering::Relaxed),
            payload,
        );
        let bytes = serde_json::to_vec(&event).map_err(|source| DeliveryError::Encode {
            subject: subject.to_string(),
            source,
        })?;

        self.tx
            .send(Frame {
                subject,
                payload: bytes::Bytes::from(bytes),
            })
            .map(|_| ())
            .map_err(|_| DeliveryError::NoSubscribers(subject.to_string()))
    }
}

/// [`ProgressSink`] that publishes on the bus.
#[derive(Clone)]
pub struct ChannelSink {
    publisher: Publisher,
}

impl ChannelSink {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }
}

impl ProgressSink for ChannelSink {
    fn emit_progress(
        &self,
        actor: &ActorId,
        animation_id: AnimationId,
        target: &Target,
        stage: u8,
        stage_count: u8,
    ) -> Result<(), DeliveryError> {
        self.publisher.publish(
            subjects::PROGRESS,
            ProgressUpdate {
                actor: actor.clone(),
                animation_id,
                target: target.clone(),
                stage,
                stage_count,
            },
        )
    }

    fn clear_progress(
        &self,
        actor: &ActorId,
        animation_id: AnimationId,
        target: &Target,
    ) -> Result<(), DeliveryError> {
        self.publisher.publish(
            subjects::PROGRESS_CLEARED,
            ProgressCleared {
                actor: actor.clone(),
                animation_id,
                target: target.clone(),
            },
        )
    }

    fn notify(&self, actor: &ActorId, message: &str) -> Result<(), DeliveryError> {
        self.publisher.publish(
            subjects::NOTICE,
            ActorNotice {
                actor: actor.clone(),
                message: message.to_string(),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// HarvestBusAgent
// ---------------------------------------------------------------------------

/// Wraps a [`HarvestService`] together with the in-memory world and stats it
/// was built on, and drives it from inbound commands.
///
/// Call [`HarvestBusAgent::run`] inside a Tokio task to start the agent.
pub struct HarvestBusAgent {
    config: HarvestBusConfig,
    service: Arc<Mutex<HarvestService>>,
    world: Arc<GridWorld>,
    stats: Arc<StatTable>,
    publisher: Publisher,
}

impl HarvestBusAgent {
    pub fn new(
        config: HarvestBusConfig,
        service: Arc<Mutex<HarvestService>>,
        world: Arc<GridWorld>,
        stats: Arc<StatTable>,
        publisher: Publisher,
    ) -> Self {
        Self {
            config,
            service,
            world,
            stats,
            publisher,
        }
    }

    pub fn service(&self) -> &Arc<Mutex<HarvestService>> {
        &self.service
    }

    /// Apply one inbound command.
    pub fn apply(&self, cmd: InboundCommand) {
        match cmd {
            InboundCommand::ActorJoin { actor } => self.world.join(&actor),
            InboundCommand::ActorLeave { actor } => {
                self.world.leave(&actor);
                self.service.lock().actor_disconnected(&actor);
            }
            InboundCommand::Aim { actor, pos } => self.world.aim(&actor, pos),
            InboundCommand::ClearAim { actor } => self.world.clear_aim(&actor),
            InboundCommand::BeginBreak { actor, pos } => {
                let Some(category) = self.world.node_at(pos) else {
                    debug!("{} began breaking empty position {}", actor, pos);
                    return;
                };
                let outcome = self
                    .service
                    .lock()
                    .begin_interaction(&actor, Target { pos, category });
                debug!("begin_break from {}: {:?}", actor, outcome);
            }
            InboundCommand::ContinueBreak { actor } => {
                self.service.lock().on_continued_action(&actor);
            }
            InboundCommand::AbortBreak { actor } => {
                self.service.lock().abort(&actor);
            }
            InboundCommand::PlaceNode { pos, category } => {
                self.world.place(pos, NodeCategory::new(category));
            }
            InboundCommand::SetSpeed { actor, speed } => self.stats.set_speed(&actor, speed),
            InboundCommand::SetYieldMultiplier {
                actor,
                family,
                value,
            } => self.stats.set_yield_multiplier(&actor, family, value),
            InboundCommand::Stats => {
                let reply = {
                    let svc = self.service.lock();
                    StatsReply {
                        stats: svc.stats(),
                        operations: svc.operations(),
                    }
                };
                self.publish(subjects::STATS, reply);
            }
        }
    }

    /// Tick the service once and publish what it produced.
    pub fn tick(&self) -> TickEvents {
        // Hold the lock only long enough to tick, then release before publishing.
        let events = {
            let mut svc = self.service.lock();
            self.publisher.set_frame(svc.now() + 1);
            svc.tick()
        };
        self.publish_outcomes(&events);
        events
    }

    fn publish_outcomes(&self, events: &TickEvents) {
        for harvested in &events.harvested {
            self.publish(subjects::NODE_HARVESTED, harvested);
        }
        for cancelled in &events.cancelled {
            self.publish(subjects::OPERATION_CANCELLED, cancelled);
        }
    }

    fn publish<T: Serialize>(&self, subject: &'static str, payload: T) {
        match self.publisher.publish(subject, payload) {
            Ok(()) => {}
            Err(e @ DeliveryError::NoSubscribers(_)) => debug!("{}", e),
            Err(e) => warn!("Failed to publish to {}: {}", subject, e),
        }
    }

    /// Run until the inbound channel closes or ctrl-c, then cancel every
    /// live operation.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundCommand>) -> Result<()> {
        info!(
            "HarvestBusAgent '{}' active in session '{}' – ticking at {:.0}Hz",
            self.config.participant_id, self.config.session, self.config.tick_rate_hz
        );

        let interval = std::time::Duration::from_secs_f32(1.0 / self.config.tick_rate_hz);
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.tick();
                }
                cmd = inbound.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => {
                        info!("Inbound channel closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("HarvestBusAgent shutting down (SIGINT)");
                    break;
                }
            }
        }

        let cancelled = self.service.lock().shutdown();
        self.publish_outcomes(&TickEvents {
            tick: self.service.lock().now(),
            harvested: Vec::new(),
            cancelled,
        });
        Ok(())
    }
}
