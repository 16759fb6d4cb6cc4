//! Batch entity.

use chrono::NaiveDate;
use common::{BatchRef, OrderId, Sku};
use serde::{Deserialize, Serialize};

use super::OrderLine;

/// A deliverable quantity of stock for one SKU.
///
/// A batch without an ETA is warehouse stock; a batch with an ETA is still
/// in transit. Warehouse stock is always preferred for allocation, then
/// earlier ETAs. Allocations are kept in insertion order because the
/// deallocation tie-break depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    reference: BatchRef,
    sku: Sku,
    purchased_quantity: u32,
    eta: Option<NaiveDate>,
    allocations: Vec<OrderLine>,
}

impl Batch {
    /// Creates a new batch with no allocations.
    pub fn new(
        reference: impl Into<BatchRef>,
        sku: impl Into<Sku>,
        qty: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity: qty,
            eta,
            allocations: Vec::new(),
        }
    }

    /// Returns the batch reference.
    pub fn reference(&self) -> &BatchRef {
        &self.reference
    }

    /// Returns the SKU this batch holds.
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Returns the expected arrival date, if the batch is in transit.
    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    /// Returns the total purchased quantity.
    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    /// Returns the quantity currently allocated to order lines.
    pub fn allocated_quantity(&self) -> u32 {
        self.allocations.iter().map(|line| line.qty).sum()
    }

    /// Returns the quantity still available for allocation.
    ///
    /// Signed: the value goes transiently negative inside
    /// `Product::change_batch_quantity` while over-committed lines are
    /// being deallocated.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - i64::from(self.allocated_quantity())
    }

    /// Returns the current allocations in insertion order.
    pub fn allocations(&self) -> &[OrderLine] {
        &self.allocations
    }

    /// Returns the allocated line for the given order, if any.
    pub fn allocation_for(&self, order_id: &OrderId) -> Option<&OrderLine> {
        self.allocations
            .iter()
            .find(|line| &line.order_id == order_id)
    }

    /// Returns true if this batch can take the line: same SKU and enough
    /// available quantity.
    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= i64::from(line.qty)
    }

    pub(crate) fn allocate(&mut self, line: OrderLine) {
        if self.allocation_for(&line.order_id).is_none() {
            self.allocations.push(line);
        }
    }

    pub(crate) fn set_purchased_quantity(&mut self, qty: u32) {
        self.purchased_quantity = qty;
    }

    /// Removes and returns the allocation with the largest quantity.
    /// Ties go to the earliest-inserted line.
    pub(crate) fn deallocate_largest(&mut self) -> Option<OrderLine> {
        let idx = self
            .allocations
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.qty.cmp(&b.qty).then(ib.cmp(ia)))
            .map(|(idx, _)| idx)?;
        Some(self.allocations.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(qty: u32) -> Batch {
        Batch::new("batch-001", "SMALL-TABLE", qty, None)
    }

    #[test]
    fn available_quantity_reflects_allocations() {
        let mut b = batch(20);
        b.allocate(OrderLine::new("order-1", "SMALL-TABLE", 2));
        assert_eq!(b.allocated_quantity(), 2);
        assert_eq!(b.available_quantity(), 18);
    }

    #[test]
    fn can_allocate_if_available_greater_than_required() {
        let b = batch(20);
        assert!(b.can_allocate(&OrderLine::new("order-1", "SMALL-TABLE", 2)));
    }

    #[test]
    fn cannot_allocate_if_available_smaller_than_required() {
        let b = batch(2);
        assert!(!b.can_allocate(&OrderLine::new("order-1", "SMALL-TABLE", 20)));
    }

    #[test]
    fn can_allocate_if_available_equal_to_required() {
        let b = batch(2);
        assert!(b.can_allocate(&OrderLine::new("order-1", "SMALL-TABLE", 2)));
    }

    #[test]
    fn cannot_allocate_different_sku() {
        let b = batch(100);
        assert!(!b.can_allocate(&OrderLine::new("order-1", "EXPENSIVE-TOASTER", 10)));
    }

    #[test]
    fn allocation_is_idempotent_per_order() {
        let mut b = batch(20);
        let line = OrderLine::new("order-1", "SMALL-TABLE", 2);
        b.allocate(line.clone());
        b.allocate(line);
        assert_eq!(b.available_quantity(), 18);
        assert_eq!(b.allocations().len(), 1);
    }

    #[test]
    fn deallocate_largest_prefers_biggest_line() {
        let mut b = batch(100);
        b.allocate(OrderLine::new("order-1", "SMALL-TABLE", 5));
        b.allocate(OrderLine::new("order-2", "SMALL-TABLE", 9));
        b.allocate(OrderLine::new("order-3", "SMALL-TABLE", 3));

        let removed = b.deallocate_largest().unwrap();
        assert_eq!(removed.order_id, OrderId::new("order-2"));
        assert_eq!(b.allocations().len(), 2);
    }

    #[test]
    fn deallocate_largest_breaks_ties_by_insertion_order() {
        let mut b = batch(100);
        b.allocate(OrderLine::new("order-1", "SMALL-TABLE", 7));
        b.allocate(OrderLine::new("order-2", "SMALL-TABLE", 7));

        let removed = b.deallocate_largest().unwrap();
        assert_eq!(removed.order_id, OrderId::new("order-1"));
    }

    #[test]
    fn deallocate_largest_on_empty_batch_returns_none() {
        let mut b = batch(10);
        assert!(b.deallocate_largest().is_none());
    }
}
