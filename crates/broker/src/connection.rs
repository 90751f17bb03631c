//! Connection and channel handles.
//!
//! A [`Connection`] is opened once at process start; each thread that talks
//! to the bus gets its own [`Channel`]. Channels carry per-channel state
//! (prefetch window, unacknowledged deliveries) behind `Cell`/`RefCell`, so
//! they are `Send` but deliberately not `Sync`: concurrent publishers each
//! own a channel instead of sharing one.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::broker::{Binding, BrokerInner, ExchangeState, QueueState};
use crate::message::{Delivery, QueuedMessage};
use crate::topology::{ExchangeKind, QueueDeclare, TopologyError};

/// Open bus connection. Close channels before dropping this.
pub struct Connection {
    inner: Arc<BrokerInner>,
}

impl Connection {
    pub(crate) fn new(inner: Arc<BrokerInner>) -> Self {
        Self { inner }
    }

    /// Create a channel on this connection.
    pub fn channel(&self) -> Channel {
        Channel {
            inner: Arc::clone(&self.inner),
            prefetch: Cell::new(0),
            unacked: RefCell::new(HashMap::new()),
        }
    }

    /// Close the connection. Channels created from it stay valid until
    /// dropped; their unacknowledged deliveries are requeued then.
    pub fn close(self) {}
}

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The broker was closed; the consumer loop should stop.
    #[error("bus connection closed")]
    Closed,

    #[error("unknown exchange {0:?}")]
    UnknownExchange(String),

    #[error("unknown queue {0:?}")]
    UnknownQueue(String),

    #[error("unknown delivery tag {0}")]
    UnknownDeliveryTag(u64),

    /// Pulled with a full in-flight window; ack or nack first.
    #[error("prefetch window full ({0} unacknowledged)")]
    PrefetchExceeded(u16),

    #[error("bus internal lock poisoned")]
    Poisoned,
}

struct InFlight {
    queue: String,
    message: QueuedMessage,
}

/// A logical channel: the unit of publishing, consuming and acknowledging.
pub struct Channel {
    inner: Arc<BrokerInner>,
    /// Max unacknowledged deliveries held at once; 0 means unlimited.
    prefetch: Cell<u16>,
    unacked: RefCell<HashMap<u64, InFlight>>,
}

impl Channel {
    /// Set the prefetch window (unacknowledged deliveries held at once).
    pub fn qos(&self, prefetch: u16) {
        self.prefetch.set(prefetch);
    }

    /// Unacknowledged deliveries currently charged to this channel.
    pub fn in_flight(&self) -> usize {
        self.unacked.borrow().len()
    }

    pub fn exchange_declare(
        &self,
        name: &str,
        kind: ExchangeKind,
        durable: bool,
    ) -> Result<(), TopologyError> {
        let mut state = self.inner.state.lock().map_err(|_| TopologyError::Poisoned)?;
        if state.closed {
            return Err(TopologyError::Closed);
        }
        match state.exchanges.get(name) {
            Some(existing) if existing.kind == kind && existing.durable == durable => Ok(()),
            Some(_) => Err(TopologyError::ExchangeMismatch(name.to_string())),
            None => {
                state.exchanges.insert(
                    name.to_string(),
                    ExchangeState {
                        kind,
                        durable,
                        bindings: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    pub fn queue_declare(&self, declare: &QueueDeclare) -> Result<(), TopologyError> {
        let mut state = self.inner.state.lock().map_err(|_| TopologyError::Poisoned)?;
        if state.closed {
            return Err(TopologyError::Closed);
        }
        match state.queues.get(&declare.name) {
            Some(existing)
                if existing.durable == declare.durable
                    && existing.dead_letter == declare.dead_letter
                    && existing.max_deliveries == declare.max_deliveries =>
            {
                Ok(())
            }
            Some(_) => Err(TopologyError::QueueMismatch(declare.name.clone())),
            None => {
                state.queues.insert(
                    declare.name.clone(),
                    QueueState {
                        durable: declare.durable,
                        dead_letter: declare.dead_letter.clone(),
                        max_deliveries: declare.max_deliveries,
                        ready: Default::default(),
                    },
                );
                Ok(())
            }
        }
    }

    pub fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), TopologyError> {
        let mut state = self.inner.state.lock().map_err(|_| TopologyError::Poisoned)?;
        if state.closed {
            return Err(TopologyError::Closed);
        }
        if !state.queues.contains_key(queue) {
            return Err(TopologyError::UnknownQueue(queue.to_string()));
        }
        let exchange_state = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| TopologyError::UnknownExchange(exchange.to_string()))?;

        let already_bound = exchange_state
            .bindings
            .iter()
            .any(|b| b.queue == queue && b.pattern == pattern);
        if !already_bound {
            exchange_state.bindings.push(Binding {
                queue: queue.to_string(),
                pattern: pattern.to_string(),
            });
        }
        Ok(())
    }

    /// Publish a message to an exchange. The broker fans it out to every
    /// bound queue whose pattern matches the routing key; publishing only
    /// requires the bus to accept the message.
    pub fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: Vec<u8>,
        persistent: bool,
    ) -> Result<(), ChannelError> {
        let mut state = self.inner.state.lock().map_err(|_| ChannelError::Poisoned)?;
        if state.closed {
            return Err(ChannelError::Closed);
        }
        let queues = state
            .matching_queues(exchange, routing_key)
            .ok_or_else(|| ChannelError::UnknownExchange(exchange.to_string()))?;

        let message = QueuedMessage {
            routing_key: routing_key.to_string(),
            persistent,
            delivery_count: 0,
            body,
        };
        for queue in &queues {
            state.enqueue(queue, message.clone());
        }
        drop(state);
        self.inner.messages.notify_all();
        Ok(())
    }

    /// Block up to `timeout` for the next delivery from `queue`.
    ///
    /// Returns `Ok(None)` on timeout, `Err(Closed)` once the broker shuts
    /// down, and `Err(PrefetchExceeded)` when called with a full in-flight
    /// window (ack or nack the previous delivery first).
    pub fn next_delivery(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<Delivery>, ChannelError> {
        let prefetch = self.prefetch.get();
        if prefetch != 0 && self.unacked.borrow().len() >= prefetch as usize {
            return Err(ChannelError::PrefetchExceeded(prefetch));
        }

        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().map_err(|_| ChannelError::Poisoned)?;
        loop {
            if state.closed {
                return Err(ChannelError::Closed);
            }
            let q = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| ChannelError::UnknownQueue(queue.to_string()))?;

            if let Some(mut message) = q.ready.pop_front() {
                message.delivery_count += 1;
                state.next_tag += 1;
                let tag = state.next_tag;
                let delivery = Delivery {
                    tag,
                    routing_key: message.routing_key.clone(),
                    redelivered: message.delivery_count > 1,
                    delivery_count: message.delivery_count,
                    persistent: message.persistent,
                    body: message.body.clone(),
                };
                self.unacked.borrow_mut().insert(
                    tag,
                    InFlight {
                        queue: queue.to_string(),
                        message,
                    },
                );
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _) = self
                .inner
                .messages
                .wait_timeout(state, deadline - now)
                .map_err(|_| ChannelError::Poisoned)?;
            state = guard;
        }
    }

    /// Acknowledge a delivery: the message is gone for good.
    pub fn ack(&self, tag: u64) -> Result<(), ChannelError> {
        self.unacked
            .borrow_mut()
            .remove(&tag)
            .map(|_| ())
            .ok_or(ChannelError::UnknownDeliveryTag(tag))
    }

    /// Negatively acknowledge a delivery.
    ///
    /// With `requeue`, the message returns to the head of its queue for
    /// redelivery, unless its delivery budget is exhausted, in which case
    /// it is dead-lettered. Without `requeue`, it goes straight to the
    /// queue's dead-letter queue (or is dropped when none is configured).
    pub fn nack(&self, tag: u64, requeue: bool) -> Result<(), ChannelError> {
        let in_flight = self
            .unacked
            .borrow_mut()
            .remove(&tag)
            .ok_or(ChannelError::UnknownDeliveryTag(tag))?;

        let mut state = self.inner.state.lock().map_err(|_| ChannelError::Poisoned)?;
        if requeue {
            state.requeue_or_dead_letter(&in_flight.queue, in_flight.message);
        } else {
            state.dead_letter_from(&in_flight.queue, in_flight.message);
        }
        drop(state);
        self.inner.messages.notify_all();
        Ok(())
    }
}

impl Drop for Channel {
    /// A dropped channel abandons its unacknowledged deliveries: they are
    /// requeued for redelivery (or dead-lettered once their delivery budget
    /// is spent), mirroring a consumer connection loss.
    fn drop(&mut self) {
        let abandoned: Vec<InFlight> = self.unacked.borrow_mut().drain().map(|(_, v)| v).collect();
        if abandoned.is_empty() {
            return;
        }
        if let Ok(mut state) = self.inner.state.lock() {
            for in_flight in abandoned {
                state.requeue_or_dead_letter(&in_flight.queue, in_flight.message);
            }
        }
        self.inner.messages.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Broker;
    use crate::topology::{BindingSpec, ensure_topology};

    const EXCHANGE: &str = "event-bus";
    const QUEUE: &str = "search.product";
    const DLQ: &str = "search.product.dead-letter";

    fn setup() -> (Broker, Connection, Channel) {
        let broker = Broker::new();
        let connection = broker.connect();
        let channel = connection.channel();
        let spec = BindingSpec::new(EXCHANGE, QUEUE, "events.product.#");
        ensure_topology(&channel, &spec).unwrap();
        (broker, connection, channel)
    }

    fn publish(channel: &Channel, routing_key: &str, body: &[u8]) {
        channel
            .publish(EXCHANGE, routing_key, body.to_vec(), true)
            .unwrap();
    }

    fn short() -> Duration {
        Duration::from_millis(50)
    }

    #[test]
    fn published_message_reaches_bound_queue() {
        let (_broker, _connection, channel) = setup();
        publish(&channel, "events.product.create", b"one");

        let delivery = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
        assert_eq!(delivery.routing_key, "events.product.create");
        assert_eq!(delivery.body, b"one");
        assert!(!delivery.redelivered);
        channel.ack(delivery.tag()).unwrap();
    }

    #[test]
    fn wildcard_binding_receives_every_operation() {
        let (_broker, _connection, channel) = setup();
        for op in ["create", "update", "delete"] {
            publish(&channel, &format!("events.product.{op}"), op.as_bytes());
        }

        for op in ["create", "update", "delete"] {
            let delivery = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
            assert_eq!(delivery.body, op.as_bytes());
            channel.ack(delivery.tag()).unwrap();
        }
    }

    #[test]
    fn unmatched_routing_key_is_not_queued() {
        let (broker, _connection, channel) = setup();
        publish(&channel, "events.order.create", b"elsewhere");
        assert_eq!(broker.queue_depth(QUEUE), Some(0));
    }

    #[test]
    fn publish_to_unknown_exchange_is_rejected() {
        let (_broker, _connection, channel) = setup();
        let err = channel
            .publish("nope", "events.product.create", vec![], true)
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownExchange(_)));
    }

    #[test]
    fn prefetch_of_one_admits_one_unacked_delivery() {
        let (_broker, _connection, channel) = setup();
        publish(&channel, "events.product.create", b"first");
        publish(&channel, "events.product.create", b"second");

        let first = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
        let err = channel.next_delivery(QUEUE, short()).unwrap_err();
        assert!(matches!(err, ChannelError::PrefetchExceeded(1)));

        channel.ack(first.tag()).unwrap();
        let second = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
        assert_eq!(second.body, b"second");
    }

    #[test]
    fn nack_with_requeue_redelivers_at_queue_head() {
        let (_broker, _connection, channel) = setup();
        publish(&channel, "events.product.create", b"first");
        publish(&channel, "events.product.create", b"second");

        let delivery = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
        channel.nack(delivery.tag(), true).unwrap();

        // Requeued message comes back before the one behind it.
        let redelivered = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
        assert_eq!(redelivered.body, b"first");
        assert!(redelivered.redelivered);
        assert_eq!(redelivered.delivery_count, 2);
    }

    #[test]
    fn nack_without_requeue_dead_letters() {
        let (broker, _connection, channel) = setup();
        publish(&channel, "events.product.create", b"poison");

        let delivery = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
        channel.nack(delivery.tag(), false).unwrap();

        assert_eq!(broker.queue_depth(QUEUE), Some(0));
        assert_eq!(broker.queue_depth(DLQ), Some(1));

        let dead = channel.next_delivery(DLQ, short()).unwrap().unwrap();
        assert_eq!(dead.body, b"poison");
        channel.ack(dead.tag()).unwrap();
    }

    #[test]
    fn exhausted_delivery_budget_dead_letters_instead_of_requeueing() {
        let (broker, _connection, channel) = setup();
        publish(&channel, "events.product.create", b"stubborn");

        for _ in 0..crate::topology::DEFAULT_MAX_DELIVERIES {
            let delivery = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
            channel.nack(delivery.tag(), true).unwrap();
        }

        assert_eq!(broker.queue_depth(QUEUE), Some(0));
        assert_eq!(broker.queue_depth(DLQ), Some(1));
    }

    #[test]
    fn dropping_a_channel_requeues_its_unacked_deliveries() {
        let (broker, connection, channel) = setup();
        publish(&channel, "events.product.create", b"in flight");

        let consumer = connection.channel();
        consumer.qos(1);
        let _delivery = consumer.next_delivery(QUEUE, short()).unwrap().unwrap();
        assert_eq!(broker.queue_depth(QUEUE), Some(0));
        drop(consumer);

        assert_eq!(broker.queue_depth(QUEUE), Some(1));
        let redelivered = channel.next_delivery(QUEUE, short()).unwrap().unwrap();
        assert!(redelivered.redelivered);
    }

    #[test]
    fn close_wakes_blocked_consumer() {
        let (broker, connection, _channel) = setup();

        let consumer = connection.channel();
        let handle = std::thread::spawn(move || {
            consumer.next_delivery(QUEUE, Duration::from_secs(5))
        });

        std::thread::sleep(Duration::from_millis(20));
        broker.close();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    #[test]
    fn timeout_returns_none() {
        let (_broker, _connection, channel) = setup();
        let got = channel.next_delivery(QUEUE, Duration::from_millis(10)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn ack_of_unknown_tag_is_an_error() {
        let (_broker, _connection, channel) = setup();
        assert!(matches!(
            channel.ack(999),
            Err(ChannelError::UnknownDeliveryTag(999))
        ));
    }
}
