//! Message bus: drives a command and the whole event cascade it causes.
//!
//! One `handle` call owns one queue. Commands dispatch to exactly one
//! handler and their failures surface to the caller; events fan out to
//! zero or more handlers, each retried a bounded number of times and
//! isolated from its siblings on permanent failure.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use adapters::{AllocationsView, EventPublisher, Notifications};
use common::BatchRef;
use metrics::{counter, histogram};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::handlers;
use crate::messages::{Command, Event, Message};
use crate::unit_of_work::{ProductScope, UnitOfWork};

/// Total attempts per event handler, first try included.
const MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles per further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Which handler to run for an event. The pairing with event shapes is
/// fixed in [`MessageBus::event_handlers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventHandler {
    AddBatch,
    Allocate,
    PublishAllocated,
    AddAllocationToReadModel,
    RemoveAllocationFromReadModel,
    Reallocate,
    SendOutOfStockNotification,
}

impl EventHandler {
    fn name(self) -> &'static str {
        match self {
            EventHandler::AddBatch => "add_batch",
            EventHandler::Allocate => "allocate",
            EventHandler::PublishAllocated => "publish_allocated",
            EventHandler::AddAllocationToReadModel => "add_allocation_to_read_model",
            EventHandler::RemoveAllocationFromReadModel => "remove_allocation_from_read_model",
            EventHandler::Reallocate => "reallocate",
            EventHandler::SendOutOfStockNotification => "send_out_of_stock_notification",
        }
    }
}

/// The bus. Owns the unit of work and the outbound ports; each handler
/// invocation gets a fresh transactional scope.
pub struct MessageBus<U, N, P, R> {
    uow: U,
    notifications: N,
    publisher: P,
    read_model: R,
}

impl<U, N, P, R> MessageBus<U, N, P, R>
where
    U: UnitOfWork,
    N: Notifications,
    P: EventPublisher,
    R: AllocationsView,
{
    pub fn new(uow: U, notifications: N, publisher: P, read_model: R) -> Self {
        Self {
            uow,
            notifications,
            publisher,
            read_model,
        }
    }

    /// The read model the bus keeps up to date, for query-side callers.
    pub fn read_model(&self) -> &R {
        &self.read_model
    }

    /// Processes one message and every event it transitively raises.
    ///
    /// Returns the batch references chosen by `Allocate` commands during
    /// the run. A command failure is remembered, the events it raised up
    /// to the failure still cascade, and the first such error is returned
    /// once the queue drains.
    pub async fn handle(
        &self,
        message: impl Into<Message>,
    ) -> Result<Vec<BatchRef>, ServiceError> {
        let message = message.into();
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "handle_message",
            %correlation_id,
            message = message.name(),
        );
        self.process(message).instrument(span).await
    }

    async fn process(&self, message: Message) -> Result<Vec<BatchRef>, ServiceError> {
        let started = Instant::now();
        let mut queue = VecDeque::from([message]);
        let mut results = Vec::new();
        let mut first_error: Option<ServiceError> = None;

        while let Some(message) = queue.pop_front() {
            match message {
                Message::Command(command) => {
                    let name = command.name();
                    counter!("bus_messages_total", "kind" => "command", "name" => name)
                        .increment(1);

                    let (outcome, events) = self.dispatch_command(command).await;
                    queue.extend(events.into_iter().map(Message::Event));
                    match outcome {
                        Ok(Some(batch_ref)) => results.push(batch_ref),
                        Ok(None) => {}
                        Err(error) => {
                            tracing::warn!(command = name, %error, "command failed");
                            if first_error.is_none() {
                                first_error = Some(error);
                            }
                        }
                    }
                }
                Message::Event(event) => {
                    counter!("bus_messages_total", "kind" => "event", "name" => event.name())
                        .increment(1);
                    for handler in Self::event_handlers(&event) {
                        self.run_event_handler(*handler, &event, &mut queue).await;
                    }
                }
            }
        }

        histogram!("bus_handle_duration_seconds").record(started.elapsed().as_secs_f64());
        match first_error {
            Some(error) => Err(error),
            None => Ok(results),
        }
    }

    /// Runs the single handler for a command, returning its outcome plus
    /// whatever events the touched aggregates raised (on failure too).
    async fn dispatch_command(
        &self,
        command: Command,
    ) -> (Result<Option<BatchRef>, ServiceError>, Vec<Event>) {
        let mut scope = match self.uow.begin().await {
            Ok(scope) => scope,
            Err(error) => return (Err(error.into()), Vec::new()),
        };

        let outcome = match command {
            Command::CreateBatch {
                reference,
                sku,
                qty,
                eta,
            } => handlers::add_batch(&mut scope, reference, sku, qty, eta)
                .await
                .map(|()| None),
            Command::Allocate { order_id, sku, qty } => {
                handlers::allocate(&mut scope, order_id, sku, qty)
                    .await
                    .map(Some)
            }
            Command::ChangeBatchQuantity { reference, qty } => {
                handlers::change_batch_quantity(&mut scope, reference, qty)
                    .await
                    .map(|()| None)
            }
        };

        let events = scope
            .collect_new_events()
            .into_iter()
            .map(Event::from)
            .collect();
        (outcome, events)
    }

    fn event_handlers(event: &Event) -> &'static [EventHandler] {
        match event {
            Event::BatchCreated { .. } => &[EventHandler::AddBatch],
            Event::AllocationRequired { .. } => &[EventHandler::Allocate],
            Event::Allocated { .. } => &[
                EventHandler::PublishAllocated,
                EventHandler::AddAllocationToReadModel,
            ],
            Event::Deallocated { .. } => &[
                EventHandler::RemoveAllocationFromReadModel,
                EventHandler::Reallocate,
            ],
            Event::OutOfStock { .. } => &[EventHandler::SendOutOfStockNotification],
        }
    }

    /// Runs one event handler with bounded retry. A permanent failure is
    /// logged and counted but never stops the cascade.
    async fn run_event_handler(
        &self,
        handler: EventHandler,
        event: &Event,
        queue: &mut VecDeque<Message>,
    ) {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(handler, event).await {
                Ok(raised) => {
                    queue.extend(raised.into_iter().map(Message::Event));
                    return;
                }
                Err(error) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        event = event.name(),
                        handler = handler.name(),
                        attempt,
                        %error,
                        "event handler failed, retrying",
                    );
                    tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                }
                Err(error) => {
                    tracing::error!(
                        event = event.name(),
                        handler = handler.name(),
                        %error,
                        "event handler exhausted its attempts",
                    );
                    counter!(
                        "bus_event_handler_failures_total",
                        "event" => event.name(),
                        "handler" => handler.name()
                    )
                    .increment(1);
                }
            }
        }
    }

    /// One attempt of one event handler. Handlers that mutate aggregates
    /// get a fresh scope; the events they raise come back to the queue.
    async fn attempt(
        &self,
        handler: EventHandler,
        event: &Event,
    ) -> Result<Vec<Event>, ServiceError> {
        match (handler, event) {
            (
                EventHandler::AddBatch,
                Event::BatchCreated {
                    reference,
                    sku,
                    qty,
                    eta,
                },
            ) => {
                let mut scope = self.uow.begin().await?;
                handlers::add_batch(&mut scope, reference.clone(), sku.clone(), *qty, *eta)
                    .await?;
                Ok(drain(&mut scope))
            }
            (EventHandler::Allocate, Event::AllocationRequired { order_id, sku, qty }) => {
                let mut scope = self.uow.begin().await?;
                handlers::reallocate(&mut scope, order_id.clone(), sku.clone(), *qty).await?;
                Ok(drain(&mut scope))
            }
            (
                EventHandler::PublishAllocated,
                Event::Allocated {
                    order_id,
                    sku,
                    qty,
                    batch_reference,
                },
            ) => {
                handlers::publish_allocated(&self.publisher, order_id, sku, *qty, batch_reference)
                    .await?;
                Ok(Vec::new())
            }
            (
                EventHandler::AddAllocationToReadModel,
                Event::Allocated {
                    order_id,
                    sku,
                    batch_reference,
                    ..
                },
            ) => {
                handlers::add_allocation_to_read_model(
                    &self.read_model,
                    order_id,
                    sku,
                    batch_reference,
                )
                .await?;
                Ok(Vec::new())
            }
            (
                EventHandler::RemoveAllocationFromReadModel,
                Event::Deallocated { order_id, sku, .. },
            ) => {
                handlers::remove_allocation_from_read_model(&self.read_model, order_id, sku)
                    .await?;
                Ok(Vec::new())
            }
            (EventHandler::Reallocate, Event::Deallocated { order_id, sku, qty }) => {
                let mut scope = self.uow.begin().await?;
                handlers::reallocate(&mut scope, order_id.clone(), sku.clone(), *qty).await?;
                Ok(drain(&mut scope))
            }
            (EventHandler::SendOutOfStockNotification, Event::OutOfStock { sku }) => {
                handlers::send_out_of_stock_notification(&self.notifications, sku).await?;
                Ok(Vec::new())
            }
            // `event_handlers` never pairs a handler with another event's
            // shape.
            _ => Ok(Vec::new()),
        }
    }
}

fn drain<S: ProductScope>(scope: &mut S) -> Vec<Event> {
    scope.collect_new_events().into_iter().map(Event::from).collect()
}
