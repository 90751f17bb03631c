//! `searchsync-index`: the search-index capability consumed by the
//! projection.
//!
//! The search engine itself is an external collaborator; this crate defines
//! the capability surface (create/update/delete/get/search over one product
//! collection) and ships an in-memory implementation for tests and local
//! runs.

pub mod client;
pub mod memory;

pub use client::{IndexError, SearchIndex};
pub use memory::InMemoryIndex;
