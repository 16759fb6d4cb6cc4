//! Unit of work: the transactional scope around one handler invocation.

use adapters::{PersistenceError, ProductRecord, ProductStore};
use async_trait::async_trait;
use common::{BatchRef, Sku};
use domain::{Product, ProductEvent};

/// Factory for per-message transactional scopes.
///
/// The bus owns one unit of work and begins a fresh scope for every
/// handler invocation; scopes are never shared between concurrent
/// `handle` calls.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Scope: ProductScope + Send;

    /// Opens a new transactional scope.
    async fn begin(&self) -> Result<Self::Scope, PersistenceError>;
}

/// One transactional scope: the product repository plus commit/rollback
/// and the channel through which raised domain events reach the bus.
///
/// A scope dropped without `commit` discards all staged mutations. Events
/// remain collectable after a failed operation — a rejected allocation
/// still hands its `OutOfStock` event to the bus.
#[async_trait]
pub trait ProductScope: Send {
    /// Returns the product for a SKU, loading it on first access and
    /// tracking it for commit and event collection.
    async fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, PersistenceError>;

    /// Returns the product owning the given batch reference.
    async fn get_by_batch_reference(
        &mut self,
        reference: &BatchRef,
    ) -> Result<Option<&mut Product>, PersistenceError>;

    /// Stages a brand-new product.
    fn add(&mut self, product: Product);

    /// Durably persists every tracked product, version-checked.
    async fn commit(&mut self) -> Result<(), PersistenceError>;

    /// Discards all staged mutations.
    fn rollback(&mut self);

    /// Drains the events raised on every tracked product, in the order
    /// the products were first touched.
    fn collect_new_events(&mut self) -> Vec<ProductEvent>;
}

/// Unit of work over a [`ProductStore`].
#[derive(Clone)]
pub struct StoreUnitOfWork<S> {
    store: S,
}

impl<S: ProductStore + Clone> StoreUnitOfWork<S> {
    /// Creates a unit of work backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: ProductStore + Clone + 'static> UnitOfWork for StoreUnitOfWork<S> {
    type Scope = StoreScope<S>;

    async fn begin(&self) -> Result<Self::Scope, PersistenceError> {
        Ok(StoreScope {
            store: self.store.clone(),
            tracked: Vec::new(),
        })
    }
}

/// Scope implementation: an identity map of loaded products, written back
/// in one version-checked store call at commit.
pub struct StoreScope<S> {
    store: S,
    tracked: Vec<ProductRecord>,
}

impl<S> StoreScope<S> {
    fn tracked_index_by_sku(&self, sku: &Sku) -> Option<usize> {
        self.tracked.iter().position(|r| r.product.sku() == sku)
    }
}

#[async_trait]
impl<S: ProductStore> ProductScope for StoreScope<S> {
    async fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, PersistenceError> {
        if let Some(idx) = self.tracked_index_by_sku(sku) {
            return Ok(Some(&mut self.tracked[idx].product));
        }
        match self.store.load(sku).await? {
            Some(record) => {
                self.tracked.push(record);
                Ok(self.tracked.last_mut().map(|r| &mut r.product))
            }
            None => Ok(None),
        }
    }

    async fn get_by_batch_reference(
        &mut self,
        reference: &BatchRef,
    ) -> Result<Option<&mut Product>, PersistenceError> {
        if let Some(idx) = self
            .tracked
            .iter()
            .position(|r| r.product.batch(reference).is_some())
        {
            return Ok(Some(&mut self.tracked[idx].product));
        }
        match self.store.load_by_batch_reference(reference).await? {
            Some(record) => {
                // The product may already be tracked under its SKU even if
                // the tracked copy predates this batch.
                if let Some(idx) = self.tracked_index_by_sku(record.product.sku()) {
                    return Ok(Some(&mut self.tracked[idx].product));
                }
                self.tracked.push(record);
                Ok(self.tracked.last_mut().map(|r| &mut r.product))
            }
            None => Ok(None),
        }
    }

    fn add(&mut self, product: Product) {
        self.tracked.push(ProductRecord::new(product));
    }

    async fn commit(&mut self) -> Result<(), PersistenceError> {
        // Pending events travel to the bus through `collect_new_events`,
        // never into storage.
        let records: Vec<ProductRecord> = self
            .tracked
            .iter()
            .map(|r| {
                let mut product = r.product.clone();
                let _ = product.take_events();
                ProductRecord {
                    product,
                    origin_version: r.origin_version,
                }
            })
            .collect();

        self.store.store(records).await?;

        for record in &mut self.tracked {
            record.origin_version = Some(record.product.version());
        }
        Ok(())
    }

    fn rollback(&mut self) {
        self.tracked.clear();
    }

    fn collect_new_events(&mut self) -> Vec<ProductEvent> {
        let mut events = Vec::new();
        for record in &mut self.tracked {
            events.extend(record.product.take_events());
        }
        events
    }
}
