use common::Sku;
use thiserror::Error;

/// Errors that can occur when persisting products.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// Another writer committed the same product first.
    /// The stored version no longer matches the version the product was
    /// loaded at.
    #[error("concurrency conflict for sku {sku}: loaded at version {loaded}, stored is {stored}")]
    ConcurrencyConflict { sku: Sku, loaded: u64, stored: u64 },

    /// A new product was added for a SKU that already exists.
    #[error("product already exists for sku {0}")]
    DuplicateProduct(Sku),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
