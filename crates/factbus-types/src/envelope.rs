//! The event envelope: the only entity in the log.
//!
//! An envelope is built by a producer (an external caller or an internal
//! reactor), validated, appended, and is immutable afterwards. The store
//! assigns [`EventEnvelope::sequence_number`] exactly once on append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::enums::{EventCategory, ProducerType};

/// The component that emitted an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Producer {
    /// Kind of producer; constrains which categories it may emit.
    #[serde(rename = "type")]
    pub producer_type: ProducerType,
    /// Producer instance identifier.
    pub id: String,
    /// Producer software version.
    pub version: String,
}

impl Producer {
    /// Create a producer descriptor.
    pub fn new(producer_type: ProducerType, id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            producer_type,
            id: id.into(),
            version: version.into(),
        }
    }
}

/// The entity an envelope concerns. Aggregation key for projections.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Subject {
    /// Entity type, e.g. `order`.
    #[serde(rename = "type")]
    pub subject_type: String,
    /// Entity identifier, e.g. `ORD-1`.
    pub id: String,
}

impl Subject {
    /// Create a subject key.
    pub fn new(subject_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            id: id.into(),
        }
    }
}

impl core::fmt::Display for Subject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.subject_type, self.id)
    }
}

/// One record in the event log.
///
/// `payload` is category-specific structured JSON; its shape is enforced by
/// the contract validator, not by this type. A `Null` payload means the
/// producer omitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventEnvelope {
    /// Globally unique identifier (UUID-format string). The idempotency key.
    pub event_id: String,
    /// Semantic version of the envelope schema, e.g. `1.0.0`.
    pub schema_version: String,
    /// Category; selects the payload schema.
    pub event_category: EventCategory,
    /// Free-form label, e.g. `RefundRequested`.
    pub event_name: String,
    /// When the producer observed or emitted the event.
    pub occurred_at: DateTime<Utc>,
    /// Groups every envelope of one causal chain.
    pub trace_id: String,
    /// Identifier of the envelope that directly triggered this one.
    #[serde(default)]
    pub causation_id: Option<String>,
    /// Who emitted the envelope.
    pub producer: Producer,
    /// What the envelope is about.
    pub subject: Subject,
    /// Category-specific structured body.
    #[serde(default)]
    pub payload: Value,
    /// Position in the log; assigned by the store on append, absent before.
    #[serde(default)]
    pub sequence_number: Option<u64>,
}

impl EventEnvelope {
    /// The payload as a JSON object, if it is one.
    pub fn payload_object(&self) -> Option<&Map<String, Value>> {
        self.payload.as_object()
    }

    /// Look up a top-level payload field.
    pub fn payload_field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Look up a top-level payload field holding a string.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// A top-level payload field rendered as text: strings verbatim, other
    /// values in their JSON form, empty when absent.
    pub fn payload_text(&self, key: &str) -> String {
        match self.payload.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Whether the envelope concerns the given subject.
    pub fn is_about(&self, subject_type: &str, subject_id: &str) -> bool {
        self.subject.subject_type == subject_type && self.subject.id == subject_id
    }

    /// A copy suitable for re-appending to another store: same identity and
    /// content, sequence number cleared.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            sequence_number: None,
            ..self.clone()
        }
    }
}
