//! Order line value object.

use common::{OrderId, Sku};
use serde::{Deserialize, Serialize};

/// A customer order's request for a quantity of one SKU.
///
/// Order lines are immutable values compared field by field. Within one
/// product, at most one line per `order_id` may be allocated at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    /// The order this line belongs to.
    pub order_id: OrderId,

    /// The SKU being requested.
    pub sku: Sku,

    /// Requested quantity, always positive.
    pub qty: u32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, qty: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            qty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_value() {
        let a = OrderLine::new("order-1", "RED-CHAIR", 3);
        let b = OrderLine::new("order-1", "RED-CHAIR", 3);
        assert_eq!(a, b);

        let c = OrderLine::new("order-1", "RED-CHAIR", 4);
        assert_ne!(a, c);
    }

    #[test]
    fn serialization_roundtrip() {
        let line = OrderLine::new("order-7", "SMALL-TABLE", 12);
        let json = serde_json::to_string(&line).unwrap();
        let back: OrderLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, line);
    }
}
