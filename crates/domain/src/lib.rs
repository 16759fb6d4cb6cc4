//! Domain layer for the allocation system.
//!
//! This crate provides:
//! - The `Product` aggregate root, the sole consistency boundary for one SKU
//! - The `Batch` entity and `OrderLine` value object
//! - Domain events raised by the aggregate and drained by the unit of work

pub mod error;
pub mod product;

pub use error::AllocationError;
pub use product::{Batch, OrderLine, Product, ProductEvent};
