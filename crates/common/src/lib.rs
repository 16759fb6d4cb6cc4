//! Shared identifier types used across the allocation system.

pub mod types;

pub use types::{BatchRef, OrderId, Sku};
