//! Collaborator ports consumed by the allocation core, with in-memory
//! implementations used for tests and local runs.
//!
//! Ports:
//! - [`ProductStore`] — persistence with optimistic concurrency
//! - [`Notifications`] — outbound notification delivery
//! - [`EventPublisher`] — cross-process broadcast
//! - [`AllocationsView`] — denormalized order-to-batch lookups

pub mod error;
pub mod memory;
pub mod notifications;
pub mod publisher;
pub mod read_model;
pub mod store;

pub use error::{PersistenceError, Result};
pub use memory::InMemoryProductStore;
pub use notifications::{InMemoryNotifications, NotificationError, Notifications};
pub use publisher::{EventPublisher, InMemoryPublisher, PublishError};
pub use read_model::{AllocationsView, InMemoryAllocationsView, OrderAllocation, ReadModelError};
pub use store::{ProductRecord, ProductStore};
