//! Domain events raised by the `Product` aggregate.

use common::{BatchRef, OrderId, Sku};
use serde::{Deserialize, Serialize};

/// A fact recorded by the aggregate during a mutating operation.
///
/// Events are named in past tense: they describe something that has already
/// happened. They accumulate on the product's pending list and are drained
/// once by the unit of work that scoped the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    /// An order line was bound to a batch.
    Allocated {
        order_id: OrderId,
        sku: Sku,
        qty: u32,
        batch_reference: BatchRef,
    },

    /// An order line was removed from its batch and needs a new home.
    Deallocated { order_id: OrderId, sku: Sku, qty: u32 },

    /// An allocation request could not be satisfied by any batch.
    OutOfStock { sku: Sku },
}

impl ProductEvent {
    /// Returns the event type name, used for routing and logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Allocated { .. } => "Allocated",
            ProductEvent::Deallocated { .. } => "Deallocated",
            ProductEvent::OutOfStock { .. } => "OutOfStock",
        }
    }
}
