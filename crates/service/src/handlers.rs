//! Handlers: the thin translation layer between messages and aggregate
//! operations or collaborator ports.
//!
//! Each handler runs inside its own unit-of-work scope (supplied by the
//! bus) and calls `commit` itself; anything uncommitted is discarded when
//! the scope is dropped.

use adapters::{AllocationsView, EventPublisher, Notifications};
use chrono::NaiveDate;
use common::{BatchRef, OrderId, Sku};
use domain::{AllocationError, Batch, OrderLine, Product};

use crate::error::ServiceError;
use crate::unit_of_work::ProductScope;

/// Destination for out-of-stock notifications.
pub const STOCK_ALERTS_DESTINATION: &str = "stock@example.com";

/// Topic on which allocations are broadcast to other processes.
pub const LINE_ALLOCATED_TOPIC: &str = "line_allocated";

/// Registers a batch, creating the product the first time its SKU is seen.
pub async fn add_batch<S: ProductScope>(
    scope: &mut S,
    reference: BatchRef,
    sku: Sku,
    qty: u32,
    eta: Option<NaiveDate>,
) -> Result<(), ServiceError> {
    if scope.get(&sku).await?.is_none() {
        scope.add(Product::new(sku.clone()));
    }
    let product = scope
        .get(&sku)
        .await?
        .ok_or_else(|| ServiceError::InvalidSku { sku: sku.clone() })?;
    product.add_batch(Batch::new(reference, sku, qty, eta))?;
    scope.commit().await?;
    Ok(())
}

/// Allocates an order line, returning the chosen batch reference.
pub async fn allocate<S: ProductScope>(
    scope: &mut S,
    order_id: OrderId,
    sku: Sku,
    qty: u32,
) -> Result<BatchRef, ServiceError> {
    let line = OrderLine::new(order_id, sku.clone(), qty);
    let product = scope
        .get(&sku)
        .await?
        .ok_or(ServiceError::InvalidSku { sku })?;

    let outcome = product.allocate(line);
    // Commit before surfacing a rejection: a failed allocation changes no
    // state, but the out-of-stock fact it recorded must reach the bus.
    scope.commit().await?;
    Ok(outcome?)
}

/// Updates a batch's purchased quantity via its owning product.
pub async fn change_batch_quantity<S: ProductScope>(
    scope: &mut S,
    reference: BatchRef,
    qty: u32,
) -> Result<(), ServiceError> {
    let product = scope
        .get_by_batch_reference(&reference)
        .await?
        .ok_or_else(|| ServiceError::UnknownBatch {
            reference: reference.clone(),
        })?;
    product.change_batch_quantity(&reference, qty)?;
    scope.commit().await?;
    Ok(())
}

/// Re-runs allocation for a line orphaned by deallocation.
///
/// Out-of-stock is not an error here: the demand stays unallocated and the
/// recorded `OutOfStock` event carries the fact onward. Treating it as a
/// failure would make the bus retry a deterministic rejection.
pub async fn reallocate<S: ProductScope>(
    scope: &mut S,
    order_id: OrderId,
    sku: Sku,
    qty: u32,
) -> Result<(), ServiceError> {
    match allocate(scope, order_id, sku, qty).await {
        Ok(_) => Ok(()),
        Err(ServiceError::Allocation(AllocationError::OutOfStock { .. })) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Notifies the stock desk that a SKU ran out.
pub async fn send_out_of_stock_notification<N: Notifications>(
    notifications: &N,
    sku: &Sku,
) -> Result<(), ServiceError> {
    notifications
        .send(STOCK_ALERTS_DESTINATION, &format!("Out of stock for {sku}"))
        .await?;
    Ok(())
}

/// Broadcasts an allocation to other processes.
pub async fn publish_allocated<P: EventPublisher>(
    publisher: &P,
    order_id: &OrderId,
    sku: &Sku,
    qty: u32,
    batch_reference: &BatchRef,
) -> Result<(), ServiceError> {
    let payload = serde_json::json!({
        "order_id": order_id,
        "sku": sku,
        "qty": qty,
        "batch_reference": batch_reference,
    });
    publisher.publish(LINE_ALLOCATED_TOPIC, payload).await?;
    Ok(())
}

/// Records an allocation in the read model.
pub async fn add_allocation_to_read_model<R: AllocationsView>(
    read_model: &R,
    order_id: &OrderId,
    sku: &Sku,
    batch_reference: &BatchRef,
) -> Result<(), ServiceError> {
    read_model.upsert(order_id, sku, batch_reference).await?;
    Ok(())
}

/// Removes an allocation from the read model.
pub async fn remove_allocation_from_read_model<R: AllocationsView>(
    read_model: &R,
    order_id: &OrderId,
    sku: &Sku,
) -> Result<(), ServiceError> {
    read_model.remove(order_id, sku).await?;
    Ok(())
}
