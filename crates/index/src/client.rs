use std::sync::Arc;

use thiserror::Error;

use searchsync_core::{Product, ProductId};

#[derive(Debug, Error)]
pub enum IndexError {
    /// Create for an id that is already indexed. Redelivery will not fix
    /// this; it is a logic error, not a transient fault.
    #[error("document {0} already indexed")]
    Conflict(ProductId),

    /// Update for an id that is not indexed (never an implicit create).
    #[error("document {0} not indexed")]
    Missing(ProductId),

    /// The index cannot be reached right now; safe to retry.
    #[error("index unavailable: {0}")]
    Unavailable(String),
}

impl IndexError {
    /// Transient failures are retried via bus redelivery; everything else
    /// is terminal for the delivery that caused it.
    pub fn is_transient(&self) -> bool {
        matches!(self, IndexError::Unavailable(_))
    }
}

/// Search-index capability scoped to one logical collection ("product")
/// and one document kind, keyed by product id.
pub trait SearchIndex: Send + Sync {
    /// Index a new document. Fails with [`IndexError::Conflict`] when the
    /// id is already present; create is deliberately not an upsert.
    fn create(&self, id: ProductId, doc: Product) -> Result<(), IndexError>;

    /// Replace an existing document. Fails with [`IndexError::Missing`]
    /// when the id is absent.
    fn update(&self, id: ProductId, doc: Product) -> Result<(), IndexError>;

    /// Remove a document. Idempotent: deleting an absent id is a no-op.
    fn delete(&self, id: ProductId) -> Result<(), IndexError>;

    fn get(&self, id: ProductId) -> Result<Option<Product>, IndexError>;

    fn search(&self, query: &str) -> Result<Vec<Product>, IndexError>;
}

impl<I> SearchIndex for Arc<I>
where
    I: SearchIndex + ?Sized,
{
    fn create(&self, id: ProductId, doc: Product) -> Result<(), IndexError> {
        (**self).create(id, doc)
    }

    fn update(&self, id: ProductId, doc: Product) -> Result<(), IndexError> {
        (**self).update(id, doc)
    }

    fn delete(&self, id: ProductId) -> Result<(), IndexError> {
        (**self).delete(id)
    }

    fn get(&self, id: ProductId) -> Result<Option<Product>, IndexError> {
        (**self).get(id)
    }

    fn search(&self, query: &str) -> Result<Vec<Product>, IndexError> {
        (**self).search(query)
    }
}
