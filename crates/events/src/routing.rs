//! Routing-key taxonomy.
//!
//! Keys are hierarchical, dot-separated: `events.{entity_kind}.{operation}`.
//! Consumers bind with a trailing `#` wildcard to receive every operation
//! for one entity kind.

use core::str::FromStr;

use thiserror::Error;

use crate::operation::Operation;

/// Fixed namespace segment for all change events published by this system.
pub const NAMESPACE: &str = "events";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid routing key {key:?}: {reason}")]
pub struct RoutingKeyError {
    pub key: String,
    pub reason: String,
}

impl RoutingKeyError {
    fn new(key: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parsed routing key: namespace, entity kind, operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    entity_kind: String,
    operation: Operation,
}

impl RoutingKey {
    pub fn new(entity_kind: impl Into<String>, operation: Operation) -> Self {
        Self {
            entity_kind: entity_kind.into(),
            operation,
        }
    }

    pub fn entity_kind(&self) -> &str {
        &self.entity_kind
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Queue-binding pattern matching every operation for an entity kind
    /// (e.g. `events.product.#`).
    pub fn binding_pattern(entity_kind: &str) -> String {
        format!("{NAMESPACE}.{entity_kind}.#")
    }
}

impl core::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{NAMESPACE}.{}.{}", self.entity_kind, self.operation)
    }
}

impl FromStr for RoutingKey {
    type Err = RoutingKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('.');
        let (ns, kind, op) = match (segments.next(), segments.next(), segments.next()) {
            (Some(ns), Some(kind), Some(op)) => (ns, kind, op),
            _ => {
                return Err(RoutingKeyError::new(
                    s,
                    "expected three dot-separated segments",
                ));
            }
        };
        if segments.next().is_some() {
            return Err(RoutingKeyError::new(s, "too many segments"));
        }
        if ns != NAMESPACE {
            return Err(RoutingKeyError::new(
                s,
                format!("namespace must be {NAMESPACE:?}"),
            ));
        }
        if kind.is_empty() {
            return Err(RoutingKeyError::new(s, "empty entity kind"));
        }
        let operation = op
            .parse::<Operation>()
            .map_err(|e| RoutingKeyError::new(s, e.to_string()))?;
        Ok(Self {
            entity_kind: kind.to_string(),
            operation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_namespace_kind_operation() {
        let key = RoutingKey::new("product", Operation::Create);
        assert_eq!(key.to_string(), "events.product.create");
    }

    #[test]
    fn parses_all_operations() {
        for op in Operation::ALL {
            let raw = format!("events.product.{op}");
            let key: RoutingKey = raw.parse().unwrap();
            assert_eq!(key.entity_kind(), "product");
            assert_eq!(key.operation(), op);
            assert_eq!(key.to_string(), raw);
        }
    }

    #[test]
    fn rejects_foreign_namespace() {
        assert!("legacy.product.create".parse::<RoutingKey>().is_err());
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!("events.product".parse::<RoutingKey>().is_err());
        assert!("events.product.create.extra".parse::<RoutingKey>().is_err());
    }

    #[test]
    fn binding_pattern_has_trailing_wildcard() {
        assert_eq!(RoutingKey::binding_pattern("product"), "events.product.#");
    }
}
