use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchRef, Sku};
use domain::Product;
use tokio::sync::RwLock;

use crate::{
    PersistenceError, Result,
    store::{ProductRecord, ProductStore},
};

/// In-memory product store.
///
/// Keeps products in a map keyed by SKU and simulates the optimistic
/// version check a relational implementation would do with a `WHERE
/// version = ?` clause.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<Sku, Product>>>,
}

impl InMemoryProductStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns a snapshot of the stored product for assertions in tests.
    pub async fn snapshot(&self, sku: &Sku) -> Option<Product> {
        self.products.read().await.get(sku).cloned()
    }

    /// Clears all stored products.
    pub async fn clear(&self) {
        self.products.write().await.clear();
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn load(&self, sku: &Sku) -> Result<Option<ProductRecord>> {
        let products = self.products.read().await;
        Ok(products
            .get(sku)
            .map(|p| ProductRecord::loaded(p.clone(), p.version())))
    }

    async fn load_by_batch_reference(
        &self,
        reference: &BatchRef,
    ) -> Result<Option<ProductRecord>> {
        let products = self.products.read().await;
        Ok(products
            .values()
            .find(|p| p.batch(reference).is_some())
            .map(|p| ProductRecord::loaded(p.clone(), p.version())))
    }

    async fn store(&self, records: Vec<ProductRecord>) -> Result<()> {
        let mut products = self.products.write().await;

        // Validate every record before applying any, so a conflict leaves
        // the store untouched.
        for record in &records {
            let sku = record.product.sku();
            match (record.origin_version, products.get(sku)) {
                (None, Some(_)) => {
                    return Err(PersistenceError::DuplicateProduct(sku.clone()));
                }
                (Some(loaded), Some(stored)) if stored.version() != loaded => {
                    return Err(PersistenceError::ConcurrencyConflict {
                        sku: sku.clone(),
                        loaded,
                        stored: stored.version(),
                    });
                }
                (Some(loaded), None) => {
                    return Err(PersistenceError::ConcurrencyConflict {
                        sku: sku.clone(),
                        loaded,
                        stored: 0,
                    });
                }
                _ => {}
            }
        }

        for record in records {
            products.insert(record.product.sku().clone(), record.product);
        }
        Ok(())
    }
}
