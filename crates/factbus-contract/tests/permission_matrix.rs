//! Exhaustive producer type x event category permission test.
//!
//! Every pair is validated with a payload that is valid for the category,
//! so the only reason a pair can fail is the permission matrix itself.

#![allow(clippy::unwrap_used)]

use serde_json::{Value, json};

use factbus_contract::{ContractError, ContractValidator, is_permitted};
use factbus_store::{EventStore, InMemoryEventStore};
use factbus_types::{EnvelopeBuilder, EventCategory, EventEnvelope, ProducerType};

const DECISION_EVENT_ID: &str = "6f1d2c3b-4a59-4e68-8b7a-0c9d8e7f6a5b";

fn valid_payload(category: EventCategory, grounding: &str) -> Value {
    match category {
        EventCategory::Fact => json!({ "facts": { "k": 1 }, "observed_from": "api" }),
        EventCategory::Proposal => json!({
            "proposal_id": "p-1",
            "proposed_action": { "type": "refund" },
            "based_on_events": [grounding],
            "risk_level": "medium",
            "cost_estimate": 12.5,
            "priority": 2,
            "max_fact_age_ms": 60000
        }),
        EventCategory::Decision => json!({
            "decision_id": "dec-1",
            "decision_on_proposals": ["p-1"],
            "outcome": "approved",
            "policy_id": "fact_freshness",
            "policy_version": "v1",
            "reason_code": "ALL_POLICIES_PASSED"
        }),
        EventCategory::Execution => json!({
            "decision_event_id": DECISION_EVENT_ID,
            "execution_id": "exe-1",
            "status": "success",
            "executor": "refunds"
        }),
        EventCategory::Observation => json!({
            "source_tool": "search",
            "evidence_ref": "doc-1",
            "confidence": 0.8
        }),
        EventCategory::ToolCall => json!({
            "tool_name": "search",
            "caller_role": "planner",
            "args_hash": "abc",
            "started_at": "2026-01-01T00:00:00Z"
        }),
        EventCategory::ToolResult => json!({
            "tool_name": "search",
            "status": "success",
            "result_hash": "def"
        }),
        EventCategory::AgentDiagnostic => json!({
            "diagnostic_type": "belief_state",
            "state_version": "3"
        }),
    }
}

fn envelope(producer: ProducerType, category: EventCategory, grounding: &str) -> EventEnvelope {
    EnvelopeBuilder::new(category, "MatrixCheck")
        .producer(producer, "matrix", "v1")
        .subject("order", "ORD-1")
        .trace_id("trace-matrix")
        .payload(valid_payload(category, grounding))
        .build()
}

fn seeded_store() -> (InMemoryEventStore, String) {
    let store = InMemoryEventStore::new();
    let fact = store
        .append(envelope(ProducerType::Sensor, EventCategory::Fact, ""))
        .unwrap();
    (store, fact.event_id)
}

#[test]
fn listed_pairs_pass_and_unlisted_pairs_are_violations() {
    let (store, grounding) = seeded_store();
    let validator = ContractValidator::new();
    let mut permitted = 0_usize;

    for producer in ProducerType::ALL {
        for category in EventCategory::ALL {
            let result = validator.validate(&envelope(producer, category, &grounding), &store);
            if is_permitted(producer, category) {
                permitted += 1;
                assert!(result.is_ok(), "{producer} -> {category}: {result:?}");
            } else {
                assert!(
                    matches!(result, Err(ContractError::Forbidden { .. })),
                    "{producer} -> {category} should be forbidden, got {result:?}"
                );
            }
        }
    }

    // 3 fact-only producers + 5 agent + arbitrator + executor + 2 system.
    assert_eq!(permitted, 12);
}

#[test]
fn proposal_grounded_on_unknown_fact_is_a_violation() {
    let store = InMemoryEventStore::new();
    let result = ContractValidator::new().validate(
        &envelope(
            ProducerType::Agent,
            EventCategory::Proposal,
            "0b7e4a36-4f5d-4f7e-9d8a-2f1c9a6b3e10",
        ),
        &store,
    );
    let err = result.unwrap_err();
    assert!(err.is_violation());
    assert!(err.to_string().contains("unknown event_id"));
}

#[test]
fn max_fact_age_must_be_positive_integer() {
    let (store, grounding) = seeded_store();
    let validator = ContractValidator::new();

    let mut proposal = envelope(ProducerType::Agent, EventCategory::Proposal, &grounding);
    proposal.payload["max_fact_age_ms"] = json!(0);
    assert_eq!(
        validator.validate(&proposal, &store).unwrap_err().to_string(),
        "payload.max_fact_age_ms must be >= 1"
    );

    proposal.payload["max_fact_age_ms"] = json!(1.5);
    assert_eq!(
        validator.validate(&proposal, &store).unwrap_err().to_string(),
        "payload.max_fact_age_ms is required"
    );

    proposal.payload.as_object_mut().unwrap().remove("max_fact_age_ms");
    assert!(validator.validate(&proposal, &store).is_err());
}
