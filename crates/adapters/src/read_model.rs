//! Read-model port: denormalized order-to-batch lookups.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{BatchRef, OrderId, Sku};
use serde::Serialize;
use thiserror::Error;

/// A read-model write failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("read model update failed: {0}")]
pub struct ReadModelError(pub String);

/// One row of the allocations view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAllocation {
    pub sku: Sku,
    pub batch_reference: BatchRef,
}

/// Trait for the allocations read model.
///
/// Kept up to date by the `Allocated`/`Deallocated` event handlers so
/// callers can query current allocation state without replaying the
/// aggregate.
#[async_trait]
pub trait AllocationsView: Send + Sync {
    /// Inserts or replaces the batch reference for `(order_id, sku)`.
    async fn upsert(
        &self,
        order_id: &OrderId,
        sku: &Sku,
        batch_reference: &BatchRef,
    ) -> Result<(), ReadModelError>;

    /// Removes the entry for `(order_id, sku)`, if present.
    async fn remove(&self, order_id: &OrderId, sku: &Sku) -> Result<(), ReadModelError>;

    /// Returns the current allocations for one order, sorted by SKU.
    async fn allocations_for(&self, order_id: &OrderId) -> Vec<OrderAllocation>;
}

/// In-memory allocations view.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAllocationsView {
    rows: Arc<RwLock<HashMap<OrderId, BTreeMap<Sku, BatchRef>>>>,
}

impl InMemoryAllocationsView {
    /// Creates a new empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of rows across all orders.
    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap().values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl AllocationsView for InMemoryAllocationsView {
    async fn upsert(
        &self,
        order_id: &OrderId,
        sku: &Sku,
        batch_reference: &BatchRef,
    ) -> Result<(), ReadModelError> {
        self.rows
            .write()
            .unwrap()
            .entry(order_id.clone())
            .or_default()
            .insert(sku.clone(), batch_reference.clone());
        Ok(())
    }

    async fn remove(&self, order_id: &OrderId, sku: &Sku) -> Result<(), ReadModelError> {
        let mut rows = self.rows.write().unwrap();
        if let Some(per_order) = rows.get_mut(order_id) {
            per_order.remove(sku);
            if per_order.is_empty() {
                rows.remove(order_id);
            }
        }
        Ok(())
    }

    async fn allocations_for(&self, order_id: &OrderId) -> Vec<OrderAllocation> {
        self.rows
            .read()
            .unwrap()
            .get(order_id)
            .map(|per_order| {
                per_order
                    .iter()
                    .map(|(sku, batch_reference)| OrderAllocation {
                        sku: sku.clone(),
                        batch_reference: batch_reference.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
