//! Product record as committed to the system of record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ProductId;

/// Wire/storage field names for the product record.
///
/// These constants are the single source of truth for payload keys. The id
/// field in particular matters: every change-event payload must carry it,
/// and the index is keyed by it alone.
pub mod fields {
    pub const PRODUCT_ID: &str = "product_id";
    pub const TITLE: &str = "title";
    pub const LONG_TITLE: &str = "long_title";
    pub const DESCRIPTION: &str = "description";
    pub const SKU: &str = "sku";
    pub const PRICE: &str = "price";
    pub const SALES: &str = "sales";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

/// Full attribute set of a product at the moment a mutation committed.
///
/// This is what the publisher snapshots into a change-event payload for
/// Create/Update, and what the projection writes to the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub title: String,
    pub long_title: String,
    pub description: String,
    pub sku: String,
    pub price: f64,
    pub sales: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
