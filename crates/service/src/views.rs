//! Read-side queries, answered from the denormalized view rather than the
//! aggregate.

use adapters::{AllocationsView, OrderAllocation};
use common::OrderId;

/// Returns the current allocations for an order, sorted by SKU.
pub async fn allocations<V: AllocationsView>(
    order_id: &OrderId,
    view: &V,
) -> Vec<OrderAllocation> {
    view.allocations_for(order_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::InMemoryAllocationsView;
    use common::{BatchRef, Sku};

    #[tokio::test]
    async fn answers_from_the_view() {
        let view = InMemoryAllocationsView::new();
        view.upsert(&OrderId::new("o1"), &Sku::new("RED-CHAIR"), &BatchRef::new("b1"))
            .await
            .unwrap();

        let rows = allocations(&OrderId::new("o1"), &view).await;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, Sku::new("RED-CHAIR"));
    }

    #[tokio::test]
    async fn unknown_order_is_empty() {
        let view = InMemoryAllocationsView::new();
        assert!(allocations(&OrderId::new("nope"), &view).await.is_empty());
    }
}
