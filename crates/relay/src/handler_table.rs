//! Routing-key to handler resolution.

use std::collections::HashMap;

use searchsync_events::{Operation, RoutingKey};

/// Maps exact routing keys to the operation that applies them.
///
/// Populated once at startup by enumerating the closed [`Operation`] set
/// for the entity kinds this consumer owns, read-only afterwards. A lookup
/// miss means publisher/consumer version skew and is surfaced as an error
/// by the dispatcher, never silently ignored.
#[derive(Debug, Default)]
pub struct HandlerTable {
    entries: HashMap<String, Operation>,
}

impl HandlerTable {
    /// Table covering every operation of one entity kind.
    pub fn for_entity(entity_kind: &str) -> Self {
        let mut entries = HashMap::new();
        for operation in Operation::ALL {
            let key = RoutingKey::new(entity_kind, operation);
            entries.insert(key.to_string(), operation);
        }
        Self { entries }
    }

    /// Resolve a raw routing key to its handler operation.
    pub fn resolve(&self, routing_key: &str) -> Option<Operation> {
        self.entries.get(routing_key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
