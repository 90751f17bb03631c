//! `searchsync-relay`: the event propagation pipeline.
//!
//! On the write side, [`ProductPublisher`] turns a committed record-store
//! mutation into a routed change event. On the read side, a [`Dispatcher`]
//! running on a dedicated [`Worker`] thread pulls deliveries one at a time,
//! decodes them, resolves a handler through the [`HandlerTable`], applies
//! the mutation to the search index via [`ProductProjection`], and
//! acknowledges.

pub mod config;
pub mod dispatcher;
pub mod handler_table;
pub mod projection;
pub mod publisher;
pub mod worker;


pub use config::ConsumerConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use handler_table::HandlerTable;
pub use projection::{ApplyError, ProductProjection};
pub use publisher::{ProductChange, ProductPublisher, PublishError};
pub use worker::{Worker, WorkerHandle};
