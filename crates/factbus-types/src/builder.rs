//! Builder for [`EventEnvelope`] values.
//!
//! Internal reactors (arbitration, fact derivation, the intent gateway) and
//! tests construct envelopes through [`EnvelopeBuilder`]. The builder does
//! not validate: the contract validator is the only gatekeeper, so a
//! builder can deliberately produce a malformed envelope for a test.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::enums::{EventCategory, ProducerType};
use crate::envelope::{EventEnvelope, Producer, Subject};
use crate::ids::new_event_id;

/// Schema version stamped on envelopes when none is given.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

/// Builder for [`EventEnvelope`] values.
///
/// # Examples
///
/// ```
/// use factbus_types::{EnvelopeBuilder, EventCategory, ProducerType};
/// use serde_json::json;
///
/// let fact = EnvelopeBuilder::new(EventCategory::Fact, "RefundRequested")
///     .producer(ProducerType::Api, "crm", "v1")
///     .subject("order", "ORD-1")
///     .trace_id("trace-1")
///     .payload(json!({ "facts": {}, "observed_from": "api" }))
///     .build();
///
/// assert_eq!(fact.sequence_number, None);
/// assert_eq!(fact.schema_version, "1.0.0");
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    category: EventCategory,
    event_name: String,
    event_id: Option<String>,
    schema_version: Option<String>,
    occurred_at: Option<DateTime<Utc>>,
    trace_id: Option<String>,
    causation_id: Option<String>,
    producer: Option<Producer>,
    subject: Option<Subject>,
    payload: Value,
}

impl EnvelopeBuilder {
    /// Start building an envelope of the given category and name.
    pub fn new(category: EventCategory, event_name: impl Into<String>) -> Self {
        Self {
            category,
            event_name: event_name.into(),
            event_id: None,
            schema_version: None,
            occurred_at: None,
            trace_id: None,
            causation_id: None,
            producer: None,
            subject: None,
            payload: Value::Object(Map::new()),
        }
    }

    /// Use a caller-assigned event id instead of a generated one.
    #[must_use]
    pub fn event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Set the schema version.
    #[must_use]
    pub fn schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    /// Set the occurrence timestamp.
    #[must_use]
    pub const fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    /// Set the trace id.
    #[must_use]
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set the causation id.
    #[must_use]
    pub fn causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    /// Set the producer.
    #[must_use]
    pub fn producer(
        mut self,
        producer_type: ProducerType,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.producer = Some(Producer::new(producer_type, id, version));
        self
    }

    /// Set the subject.
    #[must_use]
    pub fn subject(mut self, subject_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.subject = Some(Subject::new(subject_type, id));
        self
    }

    /// Set the subject from an existing key.
    #[must_use]
    pub fn subject_key(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Produce the envelope.
    ///
    /// Unset fields get defaults: a fresh UUID v4 event id, schema
    /// [`DEFAULT_SCHEMA_VERSION`], `occurred_at = now`, a trace id equal to
    /// the event id, a `system` producer and an empty subject. The sequence
    /// number is always absent.
    pub fn build(self) -> EventEnvelope {
        let event_id = self.event_id.unwrap_or_else(new_event_id);
        let trace_id = self.trace_id.unwrap_or_else(|| event_id.clone());
        EventEnvelope {
            trace_id,
            event_id,
            schema_version: self
                .schema_version
                .unwrap_or_else(|| DEFAULT_SCHEMA_VERSION.to_owned()),
            event_category: self.category,
            event_name: self.event_name,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            causation_id: self.causation_id,
            producer: self
                .producer
                .unwrap_or_else(|| Producer::new(ProducerType::System, "", "")),
            subject: self.subject.unwrap_or_else(|| Subject::new("", "")),
            payload: self.payload,
            sequence_number: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ids::is_uuid;

    #[test]
    fn defaults_are_filled() {
        let envelope = EnvelopeBuilder::new(EventCategory::Fact, "Seen").build();
        assert!(is_uuid(&envelope.event_id));
        assert_eq!(envelope.trace_id, envelope.event_id);
        assert_eq!(envelope.schema_version, DEFAULT_SCHEMA_VERSION);
        assert!(envelope.payload.is_object());
        assert_eq!(envelope.sequence_number, None);
    }

    #[test]
    fn explicit_fields_win() {
        let envelope = EnvelopeBuilder::new(EventCategory::Execution, "Shipped")
            .event_id("id-1")
            .trace_id("trace-9")
            .causation_id("cause-1")
            .schema_version("2.1.0")
            .producer(ProducerType::Executor, "exec", "v3")
            .subject("order", "ORD-9")
            .payload(json!({ "status": "success" }))
            .build();
        assert_eq!(envelope.event_id, "id-1");
        assert_eq!(envelope.trace_id, "trace-9");
        assert_eq!(envelope.causation_id.as_deref(), Some("cause-1"));
        assert_eq!(envelope.schema_version, "2.1.0");
        assert_eq!(envelope.producer.producer_type, ProducerType::Executor);
        assert_eq!(envelope.subject.id, "ORD-9");
        assert_eq!(envelope.payload_str("status"), Some("success"));
    }
}
