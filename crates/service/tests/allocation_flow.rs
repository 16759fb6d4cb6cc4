//! End-to-end allocation flows through the message bus.

use adapters::{
    InMemoryAllocationsView, InMemoryNotifications, InMemoryProductStore, InMemoryPublisher,
};
use chrono::NaiveDate;
use common::{BatchRef, OrderId, Sku};
use domain::AllocationError;
use service::unit_of_work::StoreUnitOfWork;
use service::{Command, Event, MessageBus, ServiceError, views};

struct App {
    bus: MessageBus<
        StoreUnitOfWork<InMemoryProductStore>,
        InMemoryNotifications,
        InMemoryPublisher,
        InMemoryAllocationsView,
    >,
    store: InMemoryProductStore,
    notifications: InMemoryNotifications,
    publisher: InMemoryPublisher,
    read_model: InMemoryAllocationsView,
}

fn app() -> App {
    let store = InMemoryProductStore::new();
    let notifications = InMemoryNotifications::new();
    let publisher = InMemoryPublisher::new();
    let read_model = InMemoryAllocationsView::new();
    App {
        bus: MessageBus::new(
            StoreUnitOfWork::new(store.clone()),
            notifications.clone(),
            publisher.clone(),
            read_model.clone(),
        ),
        store,
        notifications,
        publisher,
        read_model,
    }
}

fn create_batch(reference: &str, sku: &str, qty: u32, eta: Option<NaiveDate>) -> Command {
    Command::CreateBatch {
        reference: BatchRef::new(reference),
        sku: Sku::new(sku),
        qty,
        eta,
    }
}

fn allocate(order_id: &str, sku: &str, qty: u32) -> Command {
    Command::Allocate {
        order_id: OrderId::new(order_id),
        sku: Sku::new(sku),
        qty,
    }
}

fn eta(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

#[tokio::test]
async fn warehouse_stock_is_preferred_over_shipments() {
    let app = app();
    app.bus
        .handle(create_batch("shipment", "RETRO-CLOCK", 100, eta(2026, 9, 15)))
        .await
        .unwrap();
    app.bus
        .handle(create_batch("warehouse", "RETRO-CLOCK", 100, None))
        .await
        .unwrap();

    let results = app.bus.handle(allocate("o1", "RETRO-CLOCK", 10)).await.unwrap();

    assert_eq!(results, vec![BatchRef::new("warehouse")]);
}

#[tokio::test]
async fn earlier_shipments_are_preferred() {
    let app = app();
    app.bus
        .handle(create_batch("slow", "MINIMALIST-SPOON", 100, eta(2026, 10, 1)))
        .await
        .unwrap();
    app.bus
        .handle(create_batch("fast", "MINIMALIST-SPOON", 100, eta(2026, 9, 1)))
        .await
        .unwrap();

    let results = app
        .bus
        .handle(allocate("o1", "MINIMALIST-SPOON", 10))
        .await
        .unwrap();

    assert_eq!(results, vec![BatchRef::new("fast")]);
}

#[tokio::test]
async fn allocating_the_same_order_twice_changes_nothing() {
    let app = app();
    app.bus
        .handle(create_batch("b1", "BLUE-VASE", 20, None))
        .await
        .unwrap();

    app.bus.handle(allocate("o1", "BLUE-VASE", 5)).await.unwrap();
    let second = app.bus.handle(allocate("o1", "BLUE-VASE", 5)).await.unwrap();

    assert_eq!(second, vec![BatchRef::new("b1")]);
    let stored = app.store.snapshot(&Sku::new("BLUE-VASE")).await.unwrap();
    assert_eq!(stored.batch(&BatchRef::new("b1")).unwrap().available_quantity(), 15);
    // The no-op raises no Allocated event, so only the first allocation
    // was broadcast.
    assert_eq!(app.publisher.published().len(), 1);
}

#[tokio::test]
async fn shrinking_a_batch_moves_displaced_orders_to_other_stock() {
    let app = app();
    app.bus
        .handle(create_batch("b1", "INDIFFERENT-TABLE", 50, None))
        .await
        .unwrap();
    app.bus
        .handle(create_batch("b2", "INDIFFERENT-TABLE", 50, eta(2026, 9, 4)))
        .await
        .unwrap();
    app.bus.handle(allocate("o1", "INDIFFERENT-TABLE", 20)).await.unwrap();
    app.bus.handle(allocate("o2", "INDIFFERENT-TABLE", 20)).await.unwrap();

    // Both orders landed on warehouse stock.
    let stored = app.store.snapshot(&Sku::new("INDIFFERENT-TABLE")).await.unwrap();
    assert_eq!(stored.batch(&BatchRef::new("b1")).unwrap().available_quantity(), 10);

    app.bus
        .handle(Command::ChangeBatchQuantity {
            reference: BatchRef::new("b1"),
            qty: 25,
        })
        .await
        .unwrap();

    // One order was displaced and reallocated to the shipment.
    let stored = app.store.snapshot(&Sku::new("INDIFFERENT-TABLE")).await.unwrap();
    assert_eq!(stored.batch(&BatchRef::new("b1")).unwrap().available_quantity(), 5);
    assert_eq!(stored.batch(&BatchRef::new("b2")).unwrap().available_quantity(), 30);

    // The read model followed the whole cascade.
    let o1 = views::allocations(&OrderId::new("o1"), &app.read_model).await;
    let o2 = views::allocations(&OrderId::new("o2"), &app.read_model).await;
    assert_eq!(o1[0].batch_reference, BatchRef::new("b2"));
    assert_eq!(o2[0].batch_reference, BatchRef::new("b1"));
}

#[tokio::test]
async fn exhausted_stock_notifies_and_rejects() {
    let app = app();
    app.bus
        .handle(create_batch("b1", "POPULAR-CURTAINS", 9, None))
        .await
        .unwrap();

    let result = app.bus.handle(allocate("o1", "POPULAR-CURTAINS", 10)).await;

    assert!(matches!(
        result,
        Err(ServiceError::Allocation(AllocationError::OutOfStock { .. }))
    ));
    assert_eq!(
        app.notifications.sent_to("stock@example.com"),
        vec!["Out of stock for POPULAR-CURTAINS"]
    );
    // Nothing was allocated, so nothing was published or projected.
    assert!(app.publisher.published().is_empty());
    assert_eq!(app.read_model.row_count(), 0);
}

#[tokio::test]
async fn unknown_sku_is_rejected_without_side_effects() {
    let app = app();

    let result = app.bus.handle(allocate("o1", "NONEXISTENT-SKU", 10)).await;

    assert!(matches!(result, Err(ServiceError::InvalidSku { .. })));
    assert_eq!(app.notifications.sent_count(), 0);
    assert_eq!(app.store.product_count().await, 0);
}

#[tokio::test]
async fn upstream_events_drive_the_same_flow_as_commands() {
    let app = app();

    app.bus
        .handle(Event::BatchCreated {
            reference: BatchRef::new("b1"),
            sku: Sku::new("FANCY-DESK"),
            qty: 30,
            eta: None,
        })
        .await
        .unwrap();
    app.bus
        .handle(Event::AllocationRequired {
            order_id: OrderId::new("o1"),
            sku: Sku::new("FANCY-DESK"),
            qty: 12,
        })
        .await
        .unwrap();

    let rows = views::allocations(&OrderId::new("o1"), &app.read_model).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].batch_reference, BatchRef::new("b1"));
}

#[tokio::test(start_paused = true)]
async fn transient_read_model_failures_are_retried_away() {
    let app = app();
    app.bus
        .handle(create_batch("b1", "STURDY-SHELF", 40, None))
        .await
        .unwrap();
    app.publisher.set_fail_times(2);

    app.bus.handle(allocate("o1", "STURDY-SHELF", 8)).await.unwrap();

    // Two failed attempts, then success on the third.
    assert_eq!(app.publisher.published().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn a_dead_handler_does_not_take_the_cascade_down() {
    let app = app();
    app.bus
        .handle(create_batch("b1", "STURDY-SHELF", 40, None))
        .await
        .unwrap();
    app.publisher.set_fail_times(10);

    let results = app.bus.handle(allocate("o1", "STURDY-SHELF", 8)).await.unwrap();

    assert_eq!(results, vec![BatchRef::new("b1")]);
    assert!(app.publisher.published().is_empty());
    // The sibling read-model handler for the same event still ran.
    let rows = views::allocations(&OrderId::new("o1"), &app.read_model).await;
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn an_order_can_span_skus_in_the_read_model() {
    let app = app();
    app.bus.handle(create_batch("b1", "RED-CHAIR", 20, None)).await.unwrap();
    app.bus.handle(create_batch("b2", "BLUE-SOFA", 20, None)).await.unwrap();

    app.bus.handle(allocate("order-1", "RED-CHAIR", 2)).await.unwrap();
    app.bus.handle(allocate("order-1", "BLUE-SOFA", 3)).await.unwrap();

    let rows = views::allocations(&OrderId::new("order-1"), &app.read_model).await;
    assert_eq!(rows.len(), 2);
    // Sorted by SKU.
    assert_eq!(rows[0].sku, Sku::new("BLUE-SOFA"));
    assert_eq!(rows[1].sku, Sku::new("RED-CHAIR"));
}
