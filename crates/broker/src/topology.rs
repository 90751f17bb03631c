//! Bus topology declaration.
//!
//! Topology is declared once at process start and is immutable afterwards.
//! Declaring an existing exchange/queue with identical parameters is a
//! no-op; conflicting parameters are a fatal configuration error.

use thiserror::Error;

use crate::connection::Channel;

/// Exchange kinds supported by the broker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routes on dot-separated keys with `*`/`#` wildcard bindings.
    Topic,
}

/// Deliveries per message before a requeued message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Queue declaration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDeclare {
    pub name: String,
    pub durable: bool,
    /// Queue that receives rejected or delivery-exhausted messages.
    pub dead_letter: Option<String>,
    /// Bounded-redelivery policy; `None` means unbounded requeueing.
    pub max_deliveries: Option<u32>,
}

/// Static topology a consumer process declares at startup: one topic
/// exchange, one durable queue bound by a wildcard pattern, the dead-letter
/// queue behind it, and the channel prefetch window.
#[derive(Debug, Clone)]
pub struct BindingSpec {
    pub exchange: String,
    pub exchange_kind: ExchangeKind,
    pub durable: bool,
    pub queue: String,
    pub pattern: String,
    pub dead_letter_queue: Option<String>,
    pub max_deliveries: u32,
    pub prefetch: u16,
}

impl BindingSpec {
    /// Spec with the consumer defaults: durable topic exchange, durable
    /// queue, `<queue>.dead-letter` behind it, bounded redelivery, and a
    /// prefetch of one so a channel processes deliveries strictly one at a
    /// time.
    pub fn new(
        exchange: impl Into<String>,
        queue: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        let queue = queue.into();
        let dead_letter_queue = Some(format!("{queue}.dead-letter"));
        Self {
            exchange: exchange.into(),
            exchange_kind: ExchangeKind::Topic,
            durable: true,
            queue,
            pattern: pattern.into(),
            dead_letter_queue,
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            prefetch: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("exchange {0:?} already declared with conflicting parameters")]
    ExchangeMismatch(String),

    #[error("queue {0:?} already declared with conflicting parameters")]
    QueueMismatch(String),

    #[error("cannot bind: unknown exchange {0:?}")]
    UnknownExchange(String),

    #[error("cannot bind: unknown queue {0:?}")]
    UnknownQueue(String),

    #[error("bus closed")]
    Closed,

    #[error("bus internal lock poisoned")]
    Poisoned,
}

/// Declare the exchange, queues and binding described by `spec` and set the
/// channel's prefetch window. Idempotent: safe to call on every startup.
pub fn ensure_topology(channel: &Channel, spec: &BindingSpec) -> Result<(), TopologyError> {
    channel.exchange_declare(&spec.exchange, spec.exchange_kind, spec.durable)?;

    channel.queue_declare(&QueueDeclare {
        name: spec.queue.clone(),
        durable: spec.durable,
        dead_letter: spec.dead_letter_queue.clone(),
        max_deliveries: Some(spec.max_deliveries),
    })?;

    // The dead-letter queue itself: durable, no further dead-lettering.
    if let Some(dlq) = &spec.dead_letter_queue {
        channel.queue_declare(&QueueDeclare {
            name: dlq.clone(),
            durable: true,
            dead_letter: None,
            max_deliveries: None,
        })?;
    }

    channel.queue_bind(&spec.queue, &spec.exchange, &spec.pattern)?;
    channel.qos(spec.prefetch);
    Ok(())
}
