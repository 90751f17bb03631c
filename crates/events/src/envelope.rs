//! Change-event envelope and wire codec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use searchsync_core::{Product, ProductId, fields};

use crate::operation::Operation;
use crate::routing::RoutingKey;

/// Event payload: field name → value.
///
/// Create/Update carry the full attribute set; Delete carries only the
/// entity id.
pub type Payload = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum EventError {
    /// The bytes are not a valid envelope, or the payload lacks the entity
    /// id. Never retried: the delivery is dropped and reported.
    #[error("malformed event: {0}")]
    Malformed(String),

    /// Serialization failed on the publish path.
    #[error("failed to serialize event: {0}")]
    Serialize(String),
}

/// Extract the entity id a payload must carry.
pub fn entity_id(payload: &Payload) -> Result<ProductId, EventError> {
    let value = payload.get(fields::PRODUCT_ID).ok_or_else(|| {
        EventError::Malformed(format!("payload missing {:?} field", fields::PRODUCT_ID))
    })?;
    serde_json::from_value(value.clone()).map_err(|e| {
        EventError::Malformed(format!("payload {:?} field: {e}", fields::PRODUCT_ID))
    })
}

/// The unit of propagation from the record store to the search index.
///
/// Envelopes are immutable facts: constructed right after a record-store
/// mutation commits, serialized once, and gone once the consumer
/// acknowledges them. The routing key is derived, never stored, so envelope
/// and key cannot disagree.
///
/// Invariant: the payload always contains the entity id field; consumers
/// index solely by that id. Every constructor and `decode` enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    event_id: Uuid,
    entity_kind: String,
    operation: Operation,
    occurred_at: DateTime<Utc>,
    payload: Payload,
}

impl ChangeEvent {
    /// Build an envelope from an already-assembled payload.
    ///
    /// Fails with [`EventError::Malformed`] if the payload lacks the entity
    /// id field.
    pub fn new(
        entity_kind: impl Into<String>,
        operation: Operation,
        payload: Payload,
    ) -> Result<Self, EventError> {
        entity_id(&payload)?;
        Ok(Self {
            event_id: Uuid::now_v7(),
            entity_kind: entity_kind.into(),
            operation,
            occurred_at: Utc::now(),
            payload,
        })
    }

    /// Envelope for a committed product insert (full attribute set).
    pub fn created(product: &Product) -> Result<Self, EventError> {
        Self::new("product", Operation::Create, product_payload(product)?)
    }

    /// Envelope for a committed product update (full attribute set).
    pub fn updated(product: &Product) -> Result<Self, EventError> {
        Self::new("product", Operation::Update, product_payload(product)?)
    }

    /// Envelope for a committed product delete (id-only payload).
    pub fn deleted(id: ProductId) -> Result<Self, EventError> {
        let mut payload = Payload::new();
        payload.insert(
            fields::PRODUCT_ID.to_string(),
            serde_json::Value::from(id.as_u64()),
        );
        Self::new("product", Operation::Delete, payload)
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn entity_kind(&self) -> &str {
        &self.entity_kind
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Routing key derived from entity kind and operation.
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(self.entity_kind.clone(), self.operation)
    }

    /// Serialize to the self-describing wire form (JSON).
    ///
    /// `decode(encode(e)) == e` for every valid event; no external schema
    /// registry is needed to read it back.
    pub fn encode(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::Serialize(e.to_string()))
    }

    /// Parse an envelope off the wire, re-checking the id invariant.
    pub fn decode(bytes: &[u8]) -> Result<Self, EventError> {
        let event: ChangeEvent =
            serde_json::from_slice(bytes).map_err(|e| EventError::Malformed(e.to_string()))?;
        entity_id(&event.payload)?;
        Ok(event)
    }
}

fn product_payload(product: &Product) -> Result<Payload, EventError> {
    match serde_json::to_value(product) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(EventError::Serialize(format!(
            "product serialized to non-object value: {other}"
        ))),
        Err(e) => Err(EventError::Serialize(e.to_string())),
    }
}
