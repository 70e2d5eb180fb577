//! Per-category payload schemas.
//!
//! Each `check_*` function validates one category's payload object and
//! returns the first violation. Strings must be present and non-blank;
//! "integer" means a JSON number without a fractional part.

use serde_json::{Map, Value};

use factbus_store::EventStore;
use factbus_types::{
    DecisionOutcome, EventCategory, ExecutionStatus, ObservedFrom, RiskLevel, ToolResultStatus,
    TrustTier, is_uuid,
};

use crate::ContractError;

type Payload = Map<String, Value>;
type Check<T = ()> = Result<T, ContractError>;

/// Validate `payload` against the schema for `category`.
pub fn check_payload(category: EventCategory, payload: &Payload, store: &dyn EventStore) -> Check {
    match category {
        EventCategory::Fact => check_fact(payload),
        EventCategory::Proposal => check_proposal(payload, store),
        EventCategory::Decision => check_decision(payload),
        EventCategory::Execution => check_execution(payload),
        EventCategory::Observation => check_observation(payload),
        EventCategory::ToolCall => check_tool_call(payload),
        EventCategory::ToolResult => check_tool_result(payload),
        EventCategory::AgentDiagnostic => check_diagnostic(payload),
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// FACT: `facts` object, `observed_from` vocabulary, derivation fields when
/// the fact came from executor feedback.
pub fn check_fact(payload: &Payload) -> Check {
    require_object(payload, "facts", "payload.facts must be an object")?;
    let observed_from = require_str(payload, "observed_from", "payload.observed_from is required")?;
    let Some(source) = ObservedFrom::from_wire(observed_from) else {
        return Err(ContractError::violation("payload.observed_from is invalid"));
    };

    if source == ObservedFrom::ExecutorFeedback {
        for key in [
            "derivation_rule_id",
            "derivation_rule_version",
            "decision_id",
            "execution_id",
        ] {
            require_str(
                payload,
                key,
                &format!("payload.{key} is required when observed_from=executor_feedback"),
            )?;
        }
    }
    Ok(())
}

/// PROPOSAL: identity, action, grounding facts that exist in the store,
/// risk, cost, priority and the mandatory freshness bound.
pub fn check_proposal(payload: &Payload, store: &dyn EventStore) -> Check {
    require_str(payload, "proposal_id", "payload.proposal_id is required")?;
    require_object(payload, "proposed_action", "payload.proposed_action must be an object")?;

    let based_on = require_array(payload, "based_on_events", "payload.based_on_events is required")?;
    if based_on.is_empty() {
        return Err(ContractError::violation(
            "payload.based_on_events must contain at least 1 event id",
        ));
    }
    for id in based_on {
        let id = id
            .as_str()
            .filter(|s| is_uuid(s))
            .ok_or_else(|| ContractError::violation("payload.based_on_events must contain valid UUIDs"))?;
        if !store.exists_by_event_id(id)? {
            return Err(ContractError::violation(format!(
                "payload.based_on_events contains unknown event_id: {id}"
            )));
        }
    }

    let risk = require_str(payload, "risk_level", "payload.risk_level is required")?;
    if RiskLevel::from_wire(risk).is_none() {
        return Err(ContractError::violation("payload.risk_level is invalid"));
    }
    require_number(payload, "cost_estimate", "payload.cost_estimate is required")?;
    require_integer(payload, "priority", "payload.priority is required")?;

    let max_age = require_integer(payload, "max_fact_age_ms", "payload.max_fact_age_ms is required")?;
    if max_age.as_i64().is_some_and(|v| v < 1) {
        return Err(ContractError::violation("payload.max_fact_age_ms must be >= 1"));
    }
    Ok(())
}

/// DECISION: identity, proposals ruled on, outcome, crediting policy and,
/// when rejected, a structured retry hint.
pub fn check_decision(payload: &Payload) -> Check {
    require_str(payload, "decision_id", "payload.decision_id is required")?;
    let proposals = require_array(
        payload,
        "decision_on_proposals",
        "payload.decision_on_proposals is required",
    )?;
    if proposals.is_empty() {
        return Err(ContractError::violation(
            "payload.decision_on_proposals must contain at least 1 proposal id",
        ));
    }

    let outcome = require_str(payload, "outcome", "payload.outcome is required")?;
    let Some(outcome) = DecisionOutcome::from_wire(outcome) else {
        return Err(ContractError::violation("payload.outcome is invalid"));
    };
    require_str(payload, "policy_id", "payload.policy_id is required")?;
    require_str(payload, "policy_version", "payload.policy_version is required")?;
    require_str(payload, "reason_code", "payload.reason_code is required")?;

    if outcome == DecisionOutcome::Rejected {
        let Some(hint) = payload.get("retry_hint").and_then(Value::as_object) else {
            return Err(ContractError::violation(
                "payload.retry_hint must be a structured object when outcome=rejected",
            ));
        };
        check_retry_hint(hint)?;
    }
    Ok(())
}

/// Optional retry hint fields are type-checked when present.
fn check_retry_hint(hint: &Payload) -> Check {
    if let Some(tier) = hint.get("required_trust_tier") {
        if tier.as_str().and_then(TrustTier::from_wire).is_none() {
            return Err(ContractError::violation(
                "payload.retry_hint.required_trust_tier must be tier_1, tier_2, or tier_3",
            ));
        }
    }
    if hint.get("missing_fact_keys").is_some_and(|v| !v.is_array()) {
        return Err(ContractError::violation(
            "payload.retry_hint.missing_fact_keys must be an array",
        ));
    }
    if hint.get("preferred_sources").is_some_and(|v| !v.is_array()) {
        return Err(ContractError::violation(
            "payload.retry_hint.preferred_sources must be an array",
        ));
    }
    if hint.get("max_observation_age_ms").is_some_and(|v| !is_integer(v)) {
        return Err(ContractError::violation(
            "payload.retry_hint.max_observation_age_ms must be an integer",
        ));
    }
    Ok(())
}

/// EXECUTION: the decision executed, execution identity, status, executor.
pub fn check_execution(payload: &Payload) -> Check {
    let decision = require_str(payload, "decision_event_id", "payload.decision_event_id is required")?;
    if !is_uuid(decision) {
        return Err(ContractError::violation(
            "payload.decision_event_id must be a valid UUID",
        ));
    }
    require_str(payload, "execution_id", "payload.execution_id is required")?;
    let status = require_str(payload, "status", "payload.status is required")?;
    if ExecutionStatus::from_wire(status).is_none() {
        return Err(ContractError::violation("payload.status is invalid"));
    }
    require_str(payload, "executor", "payload.executor is required")?;
    Ok(())
}

/// OBSERVATION: source tool, evidence reference, numeric confidence.
pub fn check_observation(payload: &Payload) -> Check {
    require_str(payload, "source_tool", "payload.source_tool is required")?;
    require_str(payload, "evidence_ref", "payload.evidence_ref is required")?;
    require_number(payload, "confidence", "payload.confidence is required")?;
    Ok(())
}

/// `TOOL_CALL`.
pub fn check_tool_call(payload: &Payload) -> Check {
    for key in ["tool_name", "caller_role", "args_hash", "started_at"] {
        require_str(payload, key, &format!("payload.{key} is required"))?;
    }
    Ok(())
}

/// `TOOL_RESULT`.
pub fn check_tool_result(payload: &Payload) -> Check {
    require_str(payload, "tool_name", "payload.tool_name is required")?;
    let status = require_str(payload, "status", "payload.status is required")?;
    if ToolResultStatus::from_wire(status).is_none() {
        return Err(ContractError::violation(
            "payload.status must be success or failed",
        ));
    }
    require_str(payload, "result_hash", "payload.result_hash is required")?;
    Ok(())
}

/// `AGENT_DIAGNOSTIC`.
pub fn check_diagnostic(payload: &Payload) -> Check {
    require_str(payload, "diagnostic_type", "payload.diagnostic_type is required")?;
    require_str(payload, "state_version", "payload.state_version is required")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Whether `value` is a string that is empty or only whitespace.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64()
}

fn require_str<'a>(payload: &'a Payload, key: &str, message: &str) -> Check<&'a str> {
    match payload.get(key).and_then(Value::as_str) {
        Some(text) if !is_blank(text) => Ok(text),
        _ => Err(ContractError::violation(message)),
    }
}

fn require_object(payload: &Payload, key: &str, message: &str) -> Check {
    if payload.get(key).is_some_and(Value::is_object) {
        Ok(())
    } else {
        Err(ContractError::violation(message))
    }
}

fn require_array<'a>(payload: &'a Payload, key: &str, message: &str) -> Check<&'a Vec<Value>> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ContractError::violation(message))
}

fn require_number(payload: &Payload, key: &str, message: &str) -> Check {
    if payload.get(key).is_some_and(Value::is_number) {
        Ok(())
    } else {
        Err(ContractError::violation(message))
    }
}

fn require_integer<'a>(payload: &'a Payload, key: &str, message: &str) -> Check<&'a Value> {
    payload
        .get(key)
        .filter(|v| is_integer(v))
        .ok_or_else(|| ContractError::violation(message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use factbus_store::InMemoryEventStore;

    use super::*;

    fn obj(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn message(result: Check) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn fact_requires_facts_object() {
        let p = obj(json!({ "facts": [], "observed_from": "api" }));
        assert_eq!(message(check_fact(&p)), "payload.facts must be an object");
    }

    #[test]
    fn fact_rejects_unknown_source() {
        let p = obj(json!({ "facts": {}, "observed_from": "rumour" }));
        assert_eq!(message(check_fact(&p)), "payload.observed_from is invalid");
    }

    #[test]
    fn executor_feedback_needs_derivation_fields() {
        let p = obj(json!({
            "facts": {},
            "observed_from": "executor_feedback",
            "derivation_rule_id": "r",
            "derivation_rule_version": "v1",
            "decision_id": "d"
        }));
        assert_eq!(
            message(check_fact(&p)),
            "payload.execution_id is required when observed_from=executor_feedback"
        );
    }

    #[test]
    fn proposal_requires_known_grounding() {
        let store = InMemoryEventStore::new();
        let p = obj(json!({
            "proposal_id": "p-1",
            "proposed_action": {},
            "based_on_events": ["0b7e4a36-4f5d-4f7e-9d8a-2f1c9a6b3e10"],
            "risk_level": "low",
            "cost_estimate": 1,
            "priority": 1,
            "max_fact_age_ms": 10
        }));
        assert_eq!(
            message(check_proposal(&p, &store)),
            "payload.based_on_events contains unknown event_id: 0b7e4a36-4f5d-4f7e-9d8a-2f1c9a6b3e10"
        );
    }

    #[test]
    fn proposal_rejects_empty_or_malformed_grounding() {
        let store = InMemoryEventStore::new();
        let mut p = obj(json!({ "proposal_id": "p-1", "proposed_action": {}, "based_on_events": [] }));
        assert_eq!(
            message(check_proposal(&p, &store)),
            "payload.based_on_events must contain at least 1 event id"
        );
        p.insert("based_on_events".to_owned(), json!(["nope"]));
        assert_eq!(
            message(check_proposal(&p, &store)),
            "payload.based_on_events must contain valid UUIDs"
        );
    }

    #[test]
    fn decision_rejected_needs_hint_object() {
        let mut p = obj(json!({
            "decision_id": "d-1",
            "decision_on_proposals": ["p-1"],
            "outcome": "rejected",
            "policy_id": "fact_freshness",
            "policy_version": "v1",
            "reason_code": "STALE_FACT"
        }));
        assert_eq!(
            message(check_decision(&p)),
            "payload.retry_hint must be a structured object when outcome=rejected"
        );
        p.insert("retry_hint".to_owned(), json!({}));
        assert!(check_decision(&p).is_ok());
        p.insert("retry_hint".to_owned(), json!({ "required_trust_tier": "tier_9" }));
        assert!(check_decision(&p).is_err());
        p.insert("retry_hint".to_owned(), json!({ "max_observation_age_ms": 1.5 }));
        assert_eq!(
            message(check_decision(&p)),
            "payload.retry_hint.max_observation_age_ms must be an integer"
        );
    }

    #[test]
    fn approved_decision_needs_no_hint() {
        let p = obj(json!({
            "decision_id": "d-1",
            "decision_on_proposals": ["p-1"],
            "outcome": "approved",
            "policy_id": "fact_freshness",
            "policy_version": "v1",
            "reason_code": "ALL_POLICIES_PASSED"
        }));
        assert!(check_decision(&p).is_ok());
    }

    #[test]
    fn execution_checks_decision_uuid_and_status() {
        let mut p = obj(json!({
            "decision_event_id": "dec-1",
            "execution_id": "exe-1",
            "status": "success",
            "executor": "shipper"
        }));
        assert_eq!(
            message(check_execution(&p)),
            "payload.decision_event_id must be a valid UUID"
        );
        p.insert(
            "decision_event_id".to_owned(),
            json!("0b7e4a36-4f5d-4f7e-9d8a-2f1c9a6b3e10"),
        );
        assert!(check_execution(&p).is_ok());
        p.insert("status".to_owned(), json!("done"));
        assert_eq!(message(check_execution(&p)), "payload.status is invalid");
    }

    #[test]
    fn observation_confidence_must_be_numeric() {
        let p = obj(json!({ "source_tool": "t", "evidence_ref": "e", "confidence": "high" }));
        assert_eq!(message(check_observation(&p)), "payload.confidence is required");
    }

    #[test]
    fn tool_payloads() {
        let call = obj(json!({ "tool_name": "t", "caller_role": "r", "args_hash": "h" }));
        assert_eq!(message(check_tool_call(&call)), "payload.started_at is required");
        let result = obj(json!({ "tool_name": "t", "status": "timeout", "result_hash": "h" }));
        assert_eq!(
            message(check_tool_result(&result)),
            "payload.status must be success or failed"
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let p = obj(json!({ "diagnostic_type": "  ", "state_version": "1" }));
        assert_eq!(
            message(check_diagnostic(&p)),
            "payload.diagnostic_type is required"
        );
    }
}
