//! Publish path: committed record-store mutation → routed change event.

use thiserror::Error;
use tracing::debug;

use searchsync_broker::{Channel, ChannelError};
use searchsync_core::{Product, ProductId};
use searchsync_events::{ChangeEvent, EventError, RoutingKey};

/// A committed record-store mutation, as handed to the publisher.
///
/// Create/Update carry the full just-persisted attribute set; Delete needs
/// only the id.
#[derive(Debug, Clone)]
pub enum ProductChange {
    Created(Product),
    Updated(Product),
    Deleted(ProductId),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Encode(#[from] EventError),

    #[error("bus rejected event: {0}")]
    Bus(#[from] ChannelError),
}

/// Turns committed product mutations into routed, persistent bus messages.
///
/// Called strictly after the record-store mutation is durably committed.
/// The publish is not part of that transaction: a crash between commit and
/// publish loses the event for that one mutation and the index stays out of
/// sync for it (the dual-write gap). That boundary is accepted here; the
/// outbox pattern is the standard strengthening if it becomes unacceptable.
///
/// Publishing requires only that the bus accept the message; it never
/// waits on or requires index availability. Each publisher owns its
/// channel, so concurrent request contexts each get their own publisher.
pub struct ProductPublisher {
    channel: Channel,
    exchange: String,
}

impl ProductPublisher {
    pub fn new(channel: Channel, exchange: impl Into<String>) -> Self {
        Self {
            channel,
            exchange: exchange.into(),
        }
    }

    /// Publish one committed mutation. Returns the routing key used.
    pub fn publish(&self, change: &ProductChange) -> Result<RoutingKey, PublishError> {
        let event = match change {
            ProductChange::Created(product) => ChangeEvent::created(product)?,
            ProductChange::Updated(product) => ChangeEvent::updated(product)?,
            ProductChange::Deleted(id) => ChangeEvent::deleted(*id)?,
        };
        let routing_key = event.routing_key();
        let body = event.encode()?;
        self.channel
            .publish(&self.exchange, &routing_key.to_string(), body, true)?;
        debug!(
            routing_key = %routing_key,
            event_id = %event.event_id(),
            "published change event"
        );
        Ok(routing_key)
    }
}
