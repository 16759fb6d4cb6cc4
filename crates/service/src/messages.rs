//! Inbound messages: commands, events, and the sum the bus dispatches on.

use chrono::NaiveDate;
use common::{BatchRef, OrderId, Sku};
use domain::ProductEvent;
use serde::{Deserialize, Serialize};

/// An imperative request. May be rejected; the caller is waiting on the
/// outcome, so a command failure always surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Register a new stock batch, creating the product on first sight of
    /// its SKU.
    CreateBatch {
        reference: BatchRef,
        sku: Sku,
        qty: u32,
        eta: Option<NaiveDate>,
    },

    /// Allocate an order line against the product's batches.
    Allocate { order_id: OrderId, sku: Sku, qty: u32 },

    /// Change a batch's purchased quantity, deallocating what no longer
    /// fits.
    ChangeBatchQuantity { reference: BatchRef, qty: u32 },
}

impl Command {
    /// Returns the command name, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateBatch { .. } => "CreateBatch",
            Command::Allocate { .. } => "Allocate",
            Command::ChangeBatchQuantity { .. } => "ChangeBatchQuantity",
        }
    }
}

/// A statement of fact. Events fan out to zero or more handlers; each
/// handler failure is isolated and retried.
///
/// `BatchCreated` and `AllocationRequired` arrive from upstream systems;
/// the rest are raised by the `Product` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BatchCreated {
        reference: BatchRef,
        sku: Sku,
        qty: u32,
        eta: Option<NaiveDate>,
    },
    AllocationRequired { order_id: OrderId, sku: Sku, qty: u32 },
    Allocated {
        order_id: OrderId,
        sku: Sku,
        qty: u32,
        batch_reference: BatchRef,
    },
    Deallocated { order_id: OrderId, sku: Sku, qty: u32 },
    OutOfStock { sku: Sku },
}

impl Event {
    /// Returns the event name, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Event::BatchCreated { .. } => "BatchCreated",
            Event::AllocationRequired { .. } => "AllocationRequired",
            Event::Allocated { .. } => "Allocated",
            Event::Deallocated { .. } => "Deallocated",
            Event::OutOfStock { .. } => "OutOfStock",
        }
    }
}

impl From<ProductEvent> for Event {
    fn from(event: ProductEvent) -> Self {
        match event {
            ProductEvent::Allocated {
                order_id,
                sku,
                qty,
                batch_reference,
            } => Event::Allocated {
                order_id,
                sku,
                qty,
                batch_reference,
            },
            ProductEvent::Deallocated { order_id, sku, qty } => {
                Event::Deallocated { order_id, sku, qty }
            }
            ProductEvent::OutOfStock { sku } => Event::OutOfStock { sku },
        }
    }
}

/// The tagged union the bus queue holds. Closed: dispatch pattern-matches
/// exhaustively, so an unroutable message cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl Message {
    /// Returns the inner command or event name.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Command(command) => command.name(),
            Message::Event(event) => event.name(),
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_events_map_onto_bus_events() {
        let event = Event::from(ProductEvent::Deallocated {
            order_id: OrderId::new("o1"),
            sku: Sku::new("RED-CHAIR"),
            qty: 4,
        });
        assert_eq!(event.name(), "Deallocated");
    }

    #[test]
    fn message_name_passes_through() {
        let message = Message::from(Command::Allocate {
            order_id: OrderId::new("o1"),
            sku: Sku::new("RED-CHAIR"),
            qty: 2,
        });
        assert_eq!(message.name(), "Allocate");
    }

    #[test]
    fn commands_are_serde_decodable() {
        let json = r#"{"CreateBatch":{"reference":"b1","sku":"RED-CHAIR","qty":20,"eta":null}}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert_eq!(
            command,
            Command::CreateBatch {
                reference: BatchRef::new("b1"),
                sku: Sku::new("RED-CHAIR"),
                qty: 20,
                eta: None,
            }
        );
    }
}
