//! `searchsync-events`: change-event envelope and routing-key taxonomy.
//!
//! A completed record-store mutation becomes a [`ChangeEvent`]: an immutable,
//! self-describing envelope that is encoded once, routed by a hierarchical
//! key (`events.{entity_kind}.{operation}`), and decoded by the consumer.

pub mod envelope;
pub mod operation;
pub mod routing;

pub use envelope::{ChangeEvent, EventError, Payload, entity_id};
pub use operation::Operation;
pub use routing::{NAMESPACE, RoutingKey, RoutingKeyError};
