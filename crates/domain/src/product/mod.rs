//! Product aggregate: batches, order lines, and allocation rules.

mod aggregate;
mod batch;
mod events;
mod line;

pub use aggregate::Product;
pub use batch::Batch;
pub use events::ProductEvent;
pub use line::OrderLine;
