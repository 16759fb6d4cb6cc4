//! Service layer for the allocation system.
//!
//! This crate provides:
//! - `Command`/`Event` message types and the `Message` sum the bus dispatches on
//! - The unit-of-work abstraction scoping each handler invocation
//! - Handlers translating messages into aggregate operations
//! - The message bus driving a command and its whole event cascade
//! - The read-side `views` query

pub mod bus;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod unit_of_work;
pub mod views;

pub use bus::MessageBus;
pub use error::ServiceError;
pub use messages::{Command, Event, Message};
pub use unit_of_work::{ProductScope, StoreUnitOfWork, UnitOfWork};
