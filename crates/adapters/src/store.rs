//! Persistence port for products.

use async_trait::async_trait;
use common::{BatchRef, Sku};
use domain::Product;

use crate::Result;

/// A product together with the persistence version it was read at.
///
/// `origin_version` is what the optimistic-concurrency check at commit
/// compares against; a freshly created product that has never been stored
/// carries `None`.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub product: Product,
    pub origin_version: Option<u64>,
}

impl ProductRecord {
    /// Wraps a product that has never been persisted.
    pub fn new(product: Product) -> Self {
        Self {
            product,
            origin_version: None,
        }
    }

    /// Wraps a product loaded from storage at the given version.
    pub fn loaded(product: Product, origin_version: u64) -> Self {
        Self {
            product,
            origin_version: Some(origin_version),
        }
    }
}

/// Storage port for the product aggregate.
///
/// Implementations must enforce the optimistic version check in `store`:
/// a record loaded at version N may only overwrite a stored product that
/// is still at version N. All records in one `store` call are applied
/// together or not at all.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Loads the product for a SKU, if one exists.
    async fn load(&self, sku: &Sku) -> Result<Option<ProductRecord>>;

    /// Loads the product owning the batch with the given reference.
    async fn load_by_batch_reference(&self, reference: &BatchRef)
    -> Result<Option<ProductRecord>>;

    /// Writes back a set of products, version-checked.
    async fn store(&self, records: Vec<ProductRecord>) -> Result<()>;
}
