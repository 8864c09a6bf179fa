//! Progress sink: the synchronization channel as seen by the scheduler.
//!
//! Calls are fire-and-forget. A failed delivery is logged by the caller and
//! never changes operation state.

use crate::error::DeliveryError;
use crate::protocol::{ActorNotice, ProgressCleared, ProgressUpdate};
use crate::types::{ActorId, AnimationId, Target};
use parking_lot::Mutex;

pub trait ProgressSink: Send + Sync {
    fn emit_progress(
        &self,
        actor: &ActorId,
        animation_id: AnimationId,
        target: &Target,
        stage: u8,
        stage_count: u8,
    ) -> Result<(), DeliveryError>;

    fn clear_progress(
        &self,
        actor: &ActorId,
        animation_id: AnimationId,
        target: &Target,
    ) -> Result<(), DeliveryError>;

    /// User-facing message for one actor.
    fn notify(&self, actor: &ActorId, message: &str) -> Result<(), DeliveryError>;
}

/// Everything a [`RecordingSink`] has seen, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Broadcast {
    Progress(ProgressUpdate),
    Cleared(ProgressCleared),
    Notice(ActorNotice),
}

/// Sink that keeps every call in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    log: Mutex<Vec<Broadcast>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Broadcast> {
        std::mem::take(&mut *self.log.lock())
    }

    pub fn snapshot(&self) -> Vec<Broadcast> {
        self.log.lock().clone()
    }

    pub fn progress_stages(&self, animation_id: AnimationId) -> Vec<u8> {
        self.log
            .lock()
            .iter()
            .filter_map(|b| match b {
                Broadcast::Progress(p) if p.animation_id == animation_id => Some(p.stage),
                _ => None,
            })
            .collect()
    }

    pub fn notices_for(&self, actor: &ActorId) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter_map(|b| match b {
                Broadcast::Notice(n) if &n.actor == actor => Some(n.message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit_progress(
        &self,
        actor: &ActorId,
        animation_id: AnimationId,
        target: &Target,
        stage: u8,
        stage_count: u8,
    ) -> Result<(), DeliveryError> {
        self.log.lock().push(Broadcast::Progress(ProgressUpdate {
            actor: actor.clone(),
            animation_id,
            target: target.clone(),
            stage,
            stage_count,
        }));
        Ok(())
    }

    fn clear_progress(
        &self,
        actor: &ActorId,
        animation_id: AnimationId,
        target: &Target,
    ) -> Result<(), DeliveryError> {
        self.log.lock().push(Broadcast::Cleared(ProgressCleared {
            actor: actor.clone(),
            animation_id,
            target: target.clone(),
        }));
        Ok(())
    }

    fn notify(&self, actor: &ActorId, message: &str) -> Result<(), DeliveryError> {
        self.log.lock().push(Broadcast::Notice(ActorNotice {
            actor: actor.clone(),
            message: message.to_string(),
        }));
        Ok(())
    }
}
