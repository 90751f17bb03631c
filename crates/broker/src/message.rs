//! Delivery types.

/// A message handed to a consumer, pending acknowledgement.
///
/// The delivery stays charged against the channel's prefetch window until it
/// is acknowledged or negatively acknowledged; dropping the channel requeues
/// it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub(crate) tag: u64,
    /// Routing key the message was published with.
    pub routing_key: String,
    /// True when this message has been delivered before (ack was withheld).
    pub redelivered: bool,
    /// How many times this message has been delivered, this one included.
    pub delivery_count: u32,
    /// Publisher requested the message survive a broker restart.
    pub persistent: bool,
    /// Encoded message body.
    pub body: Vec<u8>,
}

impl Delivery {
    /// Channel-scoped identifier used to ack/nack this delivery.
    pub fn tag(&self) -> u64 {
        self.tag
    }
}

/// A message sitting in a queue (ready or requeued).
#[derive(Debug, Clone)]
pub(crate) struct QueuedMessage {
    pub(crate) routing_key: String,
    pub(crate) persistent: bool,
    /// Completed deliveries so far; bounded redelivery compares this against
    /// the queue's max-deliveries policy.
    pub(crate) delivery_count: u32,
    pub(crate) body: Vec<u8>,
}
