//! `searchsync-broker`: in-process message bus with topic-exchange
//! semantics.
//!
//! The propagation core talks to an AMQP-style broker: topic exchange,
//! durable queues bound by wildcard pattern, per-channel prefetch, explicit
//! acknowledgement, negative acknowledgement with or without requeue, and a
//! dead-letter path for messages that cannot be processed. This crate
//! provides those semantics in-process so the publish/consume pipeline is
//! deterministic and fully testable; a networked broker slots in behind the
//! same surface.
//!
//! Lifecycle follows the resource discipline of the consumer process:
//! one [`Broker`] handle per process, a [`Connection`] opened at startup,
//! [`Channel`]s created per thread (channels are `Send` but not `Sync`),
//! channels closed before the connection, connection before the broker.

pub mod broker;
pub mod connection;
pub mod message;
pub mod topic;
pub mod topology;

pub use broker::Broker;
pub use connection::{Channel, ChannelError, Connection};
pub use message::Delivery;
pub use topology::{
    BindingSpec, DEFAULT_MAX_DELIVERIES, ExchangeKind, QueueDeclare, TopologyError,
    ensure_topology,
};
