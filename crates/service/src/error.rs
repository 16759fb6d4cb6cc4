//! Service-layer error types.

use adapters::{NotificationError, PersistenceError, PublishError, ReadModelError};
use common::{BatchRef, Sku};
use domain::AllocationError;
use thiserror::Error;

/// Errors surfaced by handlers and the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No product exists for the requested SKU. Raised by the handler
    /// layer before touching the aggregate.
    #[error("invalid sku {sku}")]
    InvalidSku { sku: Sku },

    /// No product owns a batch with the given reference.
    #[error("unknown batch reference {reference}")]
    UnknownBatch { reference: BatchRef },

    /// The aggregate rejected the operation.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Commit-time conflict or storage failure. Always propagates; the bus
    /// never retries it.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Notification delivery failed. Transient; masked by event retry.
    #[error(transparent)]
    Notification(#[from] NotificationError),

    /// Broadcast publish failed. Transient; masked by event retry.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Read-model write failed. Transient; masked by event retry.
    #[error(transparent)]
    ReadModel(#[from] ReadModelError),
}
