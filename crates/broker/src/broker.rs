//! Broker handle and shared state: exchanges, queues, bindings.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::message::QueuedMessage;
use crate::topic;
use crate::topology::ExchangeKind;

/// Process-wide bus handle.
///
/// Cheap to clone; all clones share one broker. Closing the broker wakes
/// every blocked consumer.
#[derive(Clone)]
pub struct Broker {
    pub(crate) inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                state: Mutex::new(BrokerState::default()),
                messages: Condvar::new(),
            }),
        }
    }

    /// Open a connection. One per process; channels come from the
    /// connection, one per thread.
    pub fn connect(&self) -> Connection {
        Connection::new(Arc::clone(&self.inner))
    }

    /// Close the bus. Blocked consumers return `ChannelError::Closed`;
    /// queued messages are discarded with the broker.
    pub fn close(&self) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.closed = true;
        }
        self.inner.messages.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .state
            .lock()
            .map(|state| state.closed)
            .unwrap_or(true)
    }

    /// Number of ready (undelivered) messages in a queue, if it exists.
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        let state = self.inner.state.lock().ok()?;
        state.queues.get(queue).map(|q| q.ready.len())
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct BrokerInner {
    pub(crate) state: Mutex<BrokerState>,
    /// Signalled when a queue gains a message or the broker closes.
    pub(crate) messages: Condvar,
}

#[derive(Default)]
pub(crate) struct BrokerState {
    pub(crate) exchanges: HashMap<String, ExchangeState>,
    pub(crate) queues: HashMap<String, QueueState>,
    pub(crate) closed: bool,
    pub(crate) next_tag: u64,
}

pub(crate) struct ExchangeState {
    pub(crate) kind: ExchangeKind,
    pub(crate) durable: bool,
    pub(crate) bindings: Vec<Binding>,
}

pub(crate) struct Binding {
    pub(crate) queue: String,
    pub(crate) pattern: String,
}

pub(crate) struct QueueState {
    pub(crate) durable: bool,
    pub(crate) dead_letter: Option<String>,
    pub(crate) max_deliveries: Option<u32>,
    pub(crate) ready: VecDeque<QueuedMessage>,
}

impl BrokerState {
    /// Queues bound to `exchange` whose pattern matches `routing_key`.
    /// `None` when the exchange does not exist.
    pub(crate) fn matching_queues(&self, exchange: &str, routing_key: &str) -> Option<Vec<String>> {
        let exchange = self.exchanges.get(exchange)?;
        Some(
            exchange
                .bindings
                .iter()
                .filter(|binding| topic::matches(&binding.pattern, routing_key))
                .map(|binding| binding.queue.clone())
                .collect(),
        )
    }

    pub(crate) fn enqueue(&mut self, queue: &str, message: QueuedMessage) {
        if let Some(q) = self.queues.get_mut(queue) {
            q.ready.push_back(message);
        }
    }

    /// Requeue a delivered-but-unprocessed message at the queue head, or
    /// dead-letter it once its delivery budget is exhausted.
    pub(crate) fn requeue_or_dead_letter(&mut self, queue_name: &str, message: QueuedMessage) {
        let Some(max_deliveries) = self.queues.get(queue_name).map(|q| q.max_deliveries) else {
            warn!(
                queue = queue_name,
                routing_key = %message.routing_key,
                "requeue target queue no longer exists; dropping message"
            );
            return;
        };

        if max_deliveries.is_some_and(|max| message.delivery_count >= max) {
            debug!(
                queue = queue_name,
                routing_key = %message.routing_key,
                deliveries = message.delivery_count,
                "delivery budget exhausted; dead-lettering"
            );
            self.dead_letter_from(queue_name, message);
        } else if let Some(q) = self.queues.get_mut(queue_name) {
            q.ready.push_front(message);
        }
    }

    /// Route a rejected message to the queue's dead-letter queue, or drop
    /// it when none is configured.
    pub(crate) fn dead_letter_from(&mut self, queue_name: &str, message: QueuedMessage) {
        let target = self
            .queues
            .get(queue_name)
            .and_then(|q| q.dead_letter.clone());

        match target {
            Some(dlq) => match self.queues.get_mut(&dlq) {
                Some(q) => {
                    debug!(
                        queue = queue_name,
                        dead_letter = %dlq,
                        routing_key = %message.routing_key,
                        "routing message to dead-letter queue"
                    );
                    q.ready.push_back(message);
                }
                None => warn!(
                    queue = queue_name,
                    dead_letter = %dlq,
                    routing_key = %message.routing_key,
                    "dead-letter queue not declared; dropping message"
                ),
            },
            None => warn!(
                queue = queue_name,
                routing_key = %message.routing_key,
                "no dead-letter queue configured; dropping rejected message"
            ),
        }
    }
}
