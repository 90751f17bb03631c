//! Index projection: one decoded event becomes exactly one index call.

use thiserror::Error;

use searchsync_core::Product;
use searchsync_events::{Operation, Payload, entity_id};
use searchsync_index::{IndexError, SearchIndex};

#[derive(Debug, Error)]
pub enum ApplyError {
    /// Payload cannot be read as a product document. Not retriable.
    #[error("invalid payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ApplyError {
    /// Whether a redelivery could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApplyError::Payload(_) => false,
            ApplyError::Index(err) => err.is_transient(),
        }
    }
}

/// Maps an operation and its payload onto a single search-index call.
pub struct ProductProjection<I> {
    index: I,
}

impl<I: SearchIndex> ProductProjection<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Apply one event to the index.
    ///
    /// Exactly one index call per invocation; a payload is never partially
    /// applied.
    pub fn apply(&self, operation: Operation, payload: &Payload) -> Result<(), ApplyError> {
        match operation {
            Operation::Create => {
                let document = decode_document(payload)?;
                self.index.create(document.product_id, document)?;
            }
            Operation::Update => {
                let document = decode_document(payload)?;
                self.index.update(document.product_id, document)?;
            }
            Operation::Delete => {
                let id = entity_id(payload).map_err(|err| ApplyError::Payload(err.to_string()))?;
                self.index.delete(id)?;
            }
        }
        Ok(())
    }
}

fn decode_document(payload: &Payload) -> Result<Product, ApplyError> {
    serde_json::from_value(serde_json::Value::Object(payload.clone()))
        .map_err(|err| ApplyError::Payload(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use searchsync_core::ProductId;
    use searchsync_index::InMemoryIndex;

    fn sample_payload(id: u64, title: &str) -> Payload {
        let now = Utc::now();
        let product = Product {
            product_id: ProductId::new(id),
            title: title.to_string(),
            long_title: format!("{title}, long"),
            description: "test".to_string(),
            sku: "SKU-1".to_string(),
            price: 1.0,
            sales: 0,
            created_at: now,
            updated_at: now,
        };
        match serde_json::to_value(&product) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => unreachable!("product serializes to an object"),
        }
    }

    #[test]
    fn create_inserts_the_document() {
        let projection = ProductProjection::new(InMemoryIndex::new());
        projection
            .apply(Operation::Create, &sample_payload(1, "Lamp"))
            .unwrap();

        let doc = projection.index().get(ProductId::new(1)).unwrap().unwrap();
        assert_eq!(doc.title, "Lamp");
    }

    #[test]
    fn update_replaces_the_document() {
        let projection = ProductProjection::new(InMemoryIndex::new());
        projection
            .apply(Operation::Create, &sample_payload(1, "Lamp"))
            .unwrap();
        projection
            .apply(Operation::Update, &sample_payload(1, "Desk lamp"))
            .unwrap();

        let doc = projection.index().get(ProductId::new(1)).unwrap().unwrap();
        assert_eq!(doc.title, "Desk lamp");
    }

    #[test]
    fn delete_needs_only_the_id() {
        let projection = ProductProjection::new(InMemoryIndex::new());
        projection
            .apply(Operation::Create, &sample_payload(1, "Lamp"))
            .unwrap();

        let mut payload = Payload::new();
        payload.insert(
            searchsync_core::fields::PRODUCT_ID.to_string(),
            serde_json::json!(1),
        );
        projection.apply(Operation::Delete, &payload).unwrap();

        assert!(projection.index().get(ProductId::new(1)).unwrap().is_none());
    }

    #[test]
    fn create_with_truncated_payload_is_a_payload_error() {
        let projection = ProductProjection::new(InMemoryIndex::new());
        let mut payload = Payload::new();
        payload.insert(
            searchsync_core::fields::PRODUCT_ID.to_string(),
            serde_json::json!(1),
        );

        let err = projection.apply(Operation::Create, &payload).unwrap_err();
        assert!(matches!(err, ApplyError::Payload(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn duplicate_create_surfaces_the_conflict() {
        let projection = ProductProjection::new(InMemoryIndex::new());
        let payload = sample_payload(1, "Lamp");
        projection.apply(Operation::Create, &payload).unwrap();

        let err = projection.apply(Operation::Create, &payload).unwrap_err();
        assert!(matches!(err, ApplyError::Index(IndexError::Conflict(_))));
        assert!(!err.is_transient());
    }
}
