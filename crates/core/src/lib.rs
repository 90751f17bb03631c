//! `searchsync-core`: shared domain types.
//!
//! The record store (system of record) and the search index both speak in
//! terms of these types: a strongly-typed product identifier and the full
//! product attribute set as committed by a mutation.

pub mod error;
pub mod id;
pub mod product;

pub use error::{DomainError, DomainResult};
pub use id::ProductId;
pub use product::{Product, fields};
