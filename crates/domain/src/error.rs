//! Domain error types.

use common::{BatchRef, Sku};
use thiserror::Error;

/// Errors raised by the `Product` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// No batch can satisfy the requested quantity.
    #[error("out of stock for sku {sku}")]
    OutOfStock { sku: Sku },

    /// The order line targets a different SKU than this product.
    /// SKU routing is the service layer's job; hitting this is a wiring bug.
    #[error("cannot allocate sku {line_sku} against product {product_sku}")]
    SkuMismatch { product_sku: Sku, line_sku: Sku },

    /// No batch with the given reference exists in this product.
    #[error("unknown batch reference {reference}")]
    UnknownBatch { reference: BatchRef },
}
