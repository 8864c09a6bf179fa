//! Error types.
//!
//! Rejected starts and ordinary cancellations are not errors; they are
//! reported as [`BeginOutcome`](crate::service::BeginOutcome) and
//! [`CancelReason`](crate::operation::CancelReason) values.

use crate::types::{ActorId, AnimationId};

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to load config: {0}")]
    Config(#[from] config::ConfigError),

    #[error("registry holds {found} for actor {actor}, scheduler expected {expected}")]
    RegistryMismatch {
        actor: ActorId,
        expected: AnimationId,
        found: AnimationId,
    },
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// A progress/notification broadcast could not be delivered.
///
/// Delivery is best-effort; callers log and move on.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no subscribers for {0}")]
    NoSubscribers(String),

    #[error("failed to encode {subject}: {source}")]
    Encode {
        subject: String,
        #[source]
        source: serde_json::Error,
    },
}
