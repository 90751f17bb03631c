//! Consumer configuration from the environment.

use std::time::Duration;

use tracing::debug;

use searchsync_broker::{BindingSpec, DEFAULT_MAX_DELIVERIES};
use searchsync_events::RoutingKey;

/// Consumer process configuration, read from `SEARCHSYNC_*` variables.
/// Every variable has a dev default so a bare `cargo run` works.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub exchange: String,
    pub queue: String,
    pub entity_kind: String,
    pub max_deliveries: u32,
    /// How long the worker loop blocks per pull before re-checking for
    /// shutdown.
    pub tick: Duration,
}

impl ConsumerConfig {
    pub fn from_env() -> Self {
        let exchange = env_or("SEARCHSYNC_EXCHANGE", "event-bus");
        let queue = env_or("SEARCHSYNC_QUEUE", "search.product");
        let entity_kind = env_or("SEARCHSYNC_ENTITY_KIND", "product");
        let max_deliveries = std::env::var("SEARCHSYNC_MAX_DELIVERIES")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_DELIVERIES);
        Self {
            exchange,
            queue,
            entity_kind,
            max_deliveries,
            tick: Duration::from_millis(250),
        }
    }

    /// Topology this consumer declares at startup.
    pub fn binding_spec(&self) -> BindingSpec {
        let mut spec = BindingSpec::new(
            self.exchange.as_str(),
            self.queue.as_str(),
            RoutingKey::binding_pattern(&self.entity_kind),
        );
        spec.max_deliveries = self.max_deliveries;
        spec
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        debug!(key, default, "env var not set; using default");
        default.to_string()
    })
}
