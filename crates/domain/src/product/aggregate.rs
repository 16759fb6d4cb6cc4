//! Product aggregate root.

use common::{BatchRef, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::error::AllocationError;

use super::{Batch, OrderLine, ProductEvent};

/// Aggregate root owning every batch for one SKU.
///
/// All allocation invariants are enforced here: no double allocation of an
/// order, deterministic batch choice, and deallocation of over-committed
/// lines when a batch shrinks. The aggregate is the only source of domain
/// events; they accumulate on `pending_events` until the unit of work
/// drains them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    sku: Sku,

    batches: Vec<Batch>,

    /// Optimistic-concurrency token, incremented on every mutating
    /// operation and checked by the persistence collaborator at commit.
    version: u64,

    /// Events raised during the current operation. Not part of persistent
    /// state; drained once by the unit of work.
    #[serde(skip)]
    pending_events: Vec<ProductEvent>,
}

impl Product {
    /// Creates an empty product for a SKU. Absence of stock is a valid state.
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self {
            sku: sku.into(),
            batches: Vec::new(),
            version: 0,
            pending_events: Vec::new(),
        }
    }

    /// Returns the SKU this product covers.
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Returns the concurrency version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns all batches, in arrival order.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Returns the batch with the given reference, if present.
    pub fn batch(&self, reference: &BatchRef) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Returns true if the order is currently allocated to any batch.
    pub fn is_allocated(&self, order_id: &OrderId) -> bool {
        self.batches
            .iter()
            .any(|b| b.allocation_for(order_id).is_some())
    }

    /// Drains the events raised since the last drain, in emission order.
    pub fn take_events(&mut self) -> Vec<ProductEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Appends a batch to this product.
    ///
    /// Batches are never removed; one that shrinks to zero purchased
    /// quantity stays as a record with no capacity.
    pub fn add_batch(&mut self, batch: Batch) -> Result<(), AllocationError> {
        if batch.sku() != &self.sku {
            return Err(AllocationError::SkuMismatch {
                product_sku: self.sku.clone(),
                line_sku: batch.sku().clone(),
            });
        }
        self.batches.push(batch);
        self.version += 1;
        Ok(())
    }

    /// Allocates an order line to the preferred eligible batch.
    ///
    /// Preference: warehouse stock (no ETA) before in-transit batches,
    /// earlier ETAs first. Re-allocating an order already held anywhere in
    /// this product is a no-op returning the existing batch reference.
    /// When no batch qualifies, an `OutOfStock` event is recorded and the
    /// allocation is rejected with no state change.
    pub fn allocate(&mut self, line: OrderLine) -> Result<BatchRef, AllocationError> {
        if line.sku != self.sku {
            return Err(AllocationError::SkuMismatch {
                product_sku: self.sku.clone(),
                line_sku: line.sku,
            });
        }

        if let Some(existing) = self
            .batches
            .iter()
            .find(|b| b.allocation_for(&line.order_id).is_some())
        {
            return Ok(existing.reference().clone());
        }

        let Some(target) = self
            .batches
            .iter()
            .enumerate()
            .filter(|(_, b)| b.can_allocate(&line))
            .min_by_key(|(idx, b)| (b.eta(), *idx))
            .map(|(idx, _)| idx)
        else {
            self.pending_events.push(ProductEvent::OutOfStock {
                sku: self.sku.clone(),
            });
            return Err(AllocationError::OutOfStock {
                sku: self.sku.clone(),
            });
        };

        let reference = self.batches[target].reference().clone();
        self.pending_events.push(ProductEvent::Allocated {
            order_id: line.order_id.clone(),
            sku: line.sku.clone(),
            qty: line.qty,
            batch_reference: reference.clone(),
        });
        self.batches[target].allocate(line);
        self.version += 1;
        Ok(reference)
    }

    /// Updates a batch's purchased quantity, deallocating over-committed
    /// lines until the batch is no longer negative.
    ///
    /// Lines are removed largest quantity first (insertion order breaks
    /// ties), one `Deallocated` event per removed line. Deallocation does
    /// not reallocate; that reaction belongs to the message bus.
    pub fn change_batch_quantity(
        &mut self,
        reference: &BatchRef,
        qty: u32,
    ) -> Result<(), AllocationError> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| AllocationError::UnknownBatch {
                reference: reference.clone(),
            })?;

        batch.set_purchased_quantity(qty);
        while batch.available_quantity() < 0 {
            let Some(line) = batch.deallocate_largest() else {
                break;
            };
            self.pending_events.push(ProductEvent::Deallocated {
                order_id: line.order_id,
                sku: line.sku,
                qty: line.qty,
            });
        }
        self.version += 1;
        Ok(())
    }
}
