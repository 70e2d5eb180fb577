//! Cold-start intents: turning an external request into the first FACT of
//! a trace.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use factbus_types::{
    EnvelopeBuilder, EventCategory, EventEnvelope, ObservedFrom, ProducerType, Subject,
    short_token,
};

use crate::config::GatewayConfig;
use crate::error::BusError;

/// Sources an intent may claim.
const INTENT_SOURCES: &[ObservedFrom] = &[ObservedFrom::Api, ObservedFrom::HumanInput];

/// An external intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Becomes the FACT's `event_name`.
    #[serde(default)]
    pub intent_name: String,
    /// The entity the intent concerns.
    #[serde(default)]
    pub subject: Option<Subject>,
    /// Becomes `payload.facts`; anything but an object is replaced by `{}`.
    #[serde(default)]
    pub facts: Option<Value>,
    /// `api` (default) or `human_input`.
    #[serde(default)]
    pub source: Option<String>,
    /// Trace to join; a fresh one is minted when absent or blank.
    #[serde(default)]
    pub trace_id: Option<String>,
}

/// Acknowledgement returned for an accepted intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentReceipt {
    /// Always `accepted`.
    pub status: String,
    /// Id of the published FACT.
    pub event_id: String,
    /// Trace the FACT opened or joined.
    pub trace_id: String,
    /// Sequence number assigned to the FACT.
    pub sequence_number: u64,
}

impl IntentReceipt {
    /// Acknowledge a stored FACT.
    pub fn accepted(stored: &EventEnvelope) -> Self {
        Self {
            status: "accepted".to_owned(),
            event_id: stored.event_id.clone(),
            trace_id: stored.trace_id.clone(),
            sequence_number: stored.sequence_number.unwrap_or(0),
        }
    }
}

/// Build the unpublished FACT for `request`.
///
/// # Errors
///
/// Returns [`BusError::ContractViolation`] when the name or subject is
/// missing or the source is not one of `api`, `human_input`.
pub fn intent_fact(
    request: IntentRequest,
    gateway: &GatewayConfig,
) -> Result<EventEnvelope, BusError> {
    if request.intent_name.trim().is_empty() {
        return Err(BusError::ContractViolation("intent_name is required".to_owned()));
    }

    let subject = request
        .subject
        .filter(|s| !s.subject_type.trim().is_empty() && !s.id.trim().is_empty())
        .ok_or_else(|| {
            BusError::ContractViolation("subject with type and id is required".to_owned())
        })?;

    let source = match request.source.as_deref() {
        None => ObservedFrom::Api,
        Some(raw) => ObservedFrom::from_wire(raw)
            .filter(|s| INTENT_SOURCES.contains(s))
            .ok_or_else(|| {
                BusError::ContractViolation("source must be one of: api, human_input".to_owned())
            })?,
    };

    let facts = match request.facts {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let trace_id = request
        .trace_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("trace-{}", short_token()));

    Ok(EnvelopeBuilder::new(EventCategory::Fact, request.intent_name)
        .trace_id(trace_id)
        .producer(
            ProducerType::System,
            gateway.producer_id.clone(),
            gateway.producer_version.clone(),
        )
        .subject_key(subject)
        .payload(json!({
            "facts": Value::Object(facts),
            "observed_from": source.as_str(),
        }))
        .build())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> IntentRequest {
        IntentRequest {
            intent_name: "RefundRequested".to_owned(),
            subject: Some(Subject::new("order", "ORD-1001")),
            ..IntentRequest::default()
        }
    }

    #[test]
    fn defaults_fill_source_facts_and_trace() {
        let fact = intent_fact(request(), &GatewayConfig::default()).unwrap();
        assert_eq!(fact.event_category, EventCategory::Fact);
        assert_eq!(fact.event_name, "RefundRequested");
        assert_eq!(fact.producer.producer_type, ProducerType::System);
        assert_eq!(fact.producer.id, "gateway");
        assert_eq!(fact.payload, json!({ "facts": {}, "observed_from": "api" }));
        assert!(fact.trace_id.starts_with("trace-"));
        assert_eq!(fact.trace_id.len(), "trace-".len() + 8);
    }

    #[test]
    fn keeps_supplied_trace_and_facts() {
        let req = IntentRequest {
            facts: Some(json!({ "amount": 10 })),
            source: Some("human_input".to_owned()),
            trace_id: Some("trace-abc".to_owned()),
            ..request()
        };
        let fact = intent_fact(req, &GatewayConfig::default()).unwrap();
        assert_eq!(fact.trace_id, "trace-abc");
        assert_eq!(fact.payload["facts"]["amount"], 10);
        assert_eq!(fact.payload["observed_from"], "human_input");
    }

    #[test]
    fn rejects_bad_requests() {
        let cases = [
            (
                IntentRequest { intent_name: " ".to_owned(), ..request() },
                "intent_name is required",
            ),
            (
                IntentRequest { subject: None, ..request() },
                "subject with type and id is required",
            ),
            (
                IntentRequest { subject: Some(Subject::new("order", "")), ..request() },
                "subject with type and id is required",
            ),
            (
                IntentRequest { source: Some("sensor".to_owned()), ..request() },
                "source must be one of: api, human_input",
            ),
        ];
        for (req, message) in cases {
            let err = intent_fact(req, &GatewayConfig::default()).unwrap_err();
            assert_eq!(err, BusError::ContractViolation(message.to_owned()));
        }
    }
}
