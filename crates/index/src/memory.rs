//! In-memory search index for tests/dev.

use std::collections::BTreeMap;
use std::sync::RwLock;

use searchsync_core::{Product, ProductId};

use crate::client::{IndexError, SearchIndex};

/// In-memory product index.
///
/// Documents live in a `BTreeMap` so listings and search results come back
/// in id order, which keeps tests deterministic. Search is a naive
/// case-insensitive substring match over title, long title and description;
/// an empty query matches everything.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    documents: RwLock<BTreeMap<ProductId, Product>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchIndex for InMemoryIndex {
    fn create(&self, id: ProductId, doc: Product) -> Result<(), IndexError> {
        let mut docs = self
            .documents
            .write()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))?;
        if docs.contains_key(&id) {
            return Err(IndexError::Conflict(id));
        }
        docs.insert(id, doc);
        Ok(())
    }

    fn update(&self, id: ProductId, doc: Product) -> Result<(), IndexError> {
        let mut docs = self
            .documents
            .write()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))?;
        match docs.get_mut(&id) {
            Some(existing) => {
                *existing = doc;
                Ok(())
            }
            None => Err(IndexError::Missing(id)),
        }
    }

    fn delete(&self, id: ProductId) -> Result<(), IndexError> {
        let mut docs = self
            .documents
            .write()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))?;
        docs.remove(&id);
        Ok(())
    }

    fn get(&self, id: ProductId) -> Result<Option<Product>, IndexError> {
        let docs = self
            .documents
            .read()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))?;
        Ok(docs.get(&id).cloned())
    }

    fn search(&self, query: &str) -> Result<Vec<Product>, IndexError> {
        let docs = self
            .documents
            .read()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))?;
        let needle = query.to_lowercase();
        Ok(docs
            .values()
            .filter(|doc| {
                needle.is_empty()
                    || doc.title.to_lowercase().contains(&needle)
                    || doc.long_title.to_lowercase().contains(&needle)
                    || doc.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}
