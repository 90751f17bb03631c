//! The consume-dispatch-acknowledge loop.
//!
//! One delivery at a time, driven by a prefetch window of one: pull,
//! decode, resolve a handler by routing key, apply to the index, then ack
//! or nack. Nothing is pulled while a delivery is unacknowledged.

use std::time::Duration;

use tracing::{debug, error, warn};

use searchsync_broker::{Channel, ChannelError, Delivery};
use searchsync_events::ChangeEvent;
use searchsync_index::SearchIndex;

use crate::handler_table::HandlerTable;
use crate::projection::ProductProjection;

/// What became of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler succeeded; the delivery was acknowledged.
    Applied { routing_key: String },

    /// The body could not be decoded. Acknowledged and dropped so a poison
    /// message cannot wedge the queue; the loss is reported, never hidden.
    DroppedMalformed { reason: String },

    /// No handler registered for the routing key (publisher/consumer
    /// version skew). Rejected without requeue.
    RejectedUnknownKey { routing_key: String },

    /// Non-retriable handler failure. Rejected without requeue; the
    /// broker routes it to the dead-letter queue.
    RejectedFailed { routing_key: String, reason: String },

    /// Transient handler failure. Requeued for redelivery.
    Requeued { routing_key: String, reason: String },
}

/// Processes deliveries from one queue against one projection.
///
/// Owns its channel. Not shared across threads; a second consumer gets its
/// own dispatcher on its own channel.
pub struct Dispatcher<I> {
    channel: Channel,
    queue: String,
    handlers: HandlerTable,
    projection: ProductProjection<I>,
}

impl<I: SearchIndex> Dispatcher<I> {
    pub fn new(
        channel: Channel,
        queue: impl Into<String>,
        handlers: HandlerTable,
        projection: ProductProjection<I>,
    ) -> Self {
        Self {
            channel,
            queue: queue.into(),
            handlers,
            projection,
        }
    }

    /// Wait up to `timeout` for a delivery and run it through the loop.
    ///
    /// `Ok(None)` means the queue stayed empty for the whole timeout. An
    /// `Err` is a bus-level failure; on [`ChannelError::Closed`] the caller
    /// should stop consuming.
    pub fn process_next(&self, timeout: Duration) -> Result<Option<DispatchOutcome>, ChannelError> {
        match self.channel.next_delivery(&self.queue, timeout)? {
            Some(delivery) => self.process(delivery).map(Some),
            None => Ok(None),
        }
    }

    fn process(&self, delivery: Delivery) -> Result<DispatchOutcome, ChannelError> {
        let tag = delivery.tag();
        let routing_key = delivery.routing_key.clone();

        let event = match ChangeEvent::decode(&delivery.body) {
            Ok(event) => event,
            Err(err) => {
                error!(
                    queue = %self.queue,
                    routing_key = %routing_key,
                    error = %err,
                    "dropping undecodable delivery"
                );
                self.channel.ack(tag)?;
                return Ok(DispatchOutcome::DroppedMalformed {
                    reason: err.to_string(),
                });
            }
        };

        // Handlers are resolved on the wire routing key, not on envelope
        // fields, so a skewed publisher cannot smuggle an event past the
        // table.
        let Some(operation) = self.handlers.resolve(&routing_key) else {
            error!(
                routing_key = %routing_key,
                event_id = %event.event_id(),
                "no handler registered for routing key; rejecting without requeue"
            );
            self.channel.nack(tag, false)?;
            return Ok(DispatchOutcome::RejectedUnknownKey { routing_key });
        };

        match self.projection.apply(operation, event.payload()) {
            Ok(()) => {
                self.channel.ack(tag)?;
                debug!(
                    routing_key = %routing_key,
                    event_id = %event.event_id(),
                    redelivered = delivery.redelivered,
                    "applied change event"
                );
                Ok(DispatchOutcome::Applied { routing_key })
            }
            Err(err) if err.is_transient() => {
                warn!(
                    routing_key = %routing_key,
                    event_id = %event.event_id(),
                    deliveries = delivery.delivery_count,
                    error = %err,
                    "transient failure; requeueing for redelivery"
                );
                self.channel.nack(tag, true)?;
                Ok(DispatchOutcome::Requeued {
                    routing_key,
                    reason: err.to_string(),
                })
            }
            Err(err) => {
                error!(
                    routing_key = %routing_key,
                    event_id = %event.event_id(),
                    error = %err,
                    "handler failed; rejecting without requeue"
                );
                self.channel.nack(tag, false)?;
                Ok(DispatchOutcome::RejectedFailed {
                    routing_key,
                    reason: err.to_string(),
                })
            }
        }
    }
}
