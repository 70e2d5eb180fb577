//! The fact derivation reactor.

use serde_json::{Value, json};
use tracing::{info, warn};

use factbus_types::{EnvelopeBuilder, EventCategory, EventEnvelope, ObservedFrom, ProducerType};

use crate::rules::{DerivationRule, default_rules};

/// `producer.id` of derived facts unless configured otherwise.
pub const DEFAULT_REACTOR_ID: &str = "fact-derivation-reactor";

/// Applies the first matching rule of an ordered list to an execution.
pub struct FactDerivationReactor {
    rules: Vec<Box<dyn DerivationRule>>,
    reactor_id: String,
}

impl core::fmt::Debug for FactDerivationReactor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let rules: Vec<&str> = self.rules.iter().map(|r| r.rule_id()).collect();
        f.debug_struct("FactDerivationReactor")
            .field("rules", &rules)
            .field("reactor_id", &self.reactor_id)
            .finish()
    }
}

impl Default for FactDerivationReactor {
    fn default() -> Self {
        Self::new(default_rules(), DEFAULT_REACTOR_ID)
    }
}

impl FactDerivationReactor {
    /// Create a reactor over `rules`, evaluated in order.
    pub fn new(rules: Vec<Box<dyn DerivationRule>>, reactor_id: impl Into<String>) -> Self {
        Self {
            rules,
            reactor_id: reactor_id.into(),
        }
    }

    /// Derive the FACT recording `execution`'s outcome.
    ///
    /// Returns `None` when the envelope is not an EXECUTION or no rule
    /// matches; the execution then stays pending in projections.
    pub fn try_derive(&self, execution: &EventEnvelope) -> Option<EventEnvelope> {
        if execution.event_category != EventCategory::Execution {
            return None;
        }

        let Some(rule) = self.rules.iter().find(|r| r.matches(execution)) else {
            warn!(
                event_id = %execution.event_id,
                status = ?execution.payload_field("status"),
                "no derivation rule matched execution"
            );
            return None;
        };

        let derived = rule.derive(execution);
        let payload = json!({
            "facts": Value::Object(derived.facts),
            "observed_from": ObservedFrom::ExecutorFeedback.as_str(),
            "derivation_rule_id": rule.rule_id(),
            "derivation_rule_version": rule.rule_version(),
            "decision_id": execution.payload_text("decision_event_id"),
            "execution_id": execution.payload_text("execution_id"),
        });

        let fact = EnvelopeBuilder::new(EventCategory::Fact, derived.event_name)
            .schema_version(execution.schema_version.clone())
            .trace_id(execution.trace_id.clone())
            .causation_id(execution.event_id.clone())
            .producer(
                ProducerType::System,
                self.reactor_id.clone(),
                format!("{}-{}", rule.rule_id(), rule.rule_version()),
            )
            .subject_key(execution.subject.clone())
            .payload(payload)
            .build();

        info!(
            rule_id = rule.rule_id(),
            rule_version = rule.rule_version(),
            source_execution = %execution.event_id,
            derived_event = %fact.event_id,
            "fact derived from execution"
        );
        Some(fact)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use factbus_types::is_uuid;

    use super::*;

    fn execution(status: &str) -> EventEnvelope {
        EnvelopeBuilder::new(EventCategory::Execution, "RefundExecuted")
            .producer(ProducerType::Executor, "refunds", "v2")
            .subject("order", "ORD-1")
            .trace_id("trace-1")
            .payload(json!({
                "decision_event_id": "6f1d2c3b-4a59-4e68-8b7a-0c9d8e7f6a5b",
                "execution_id": "exe-1",
                "status": status,
                "executor": "refunds",
                "external_reference": "rf_123"
            }))
            .build()
    }

    #[test]
    fn success_derives_confirmed_fact() {
        let reactor = FactDerivationReactor::default();
        let exec = execution("success");
        let fact = reactor.try_derive(&exec).unwrap();

        assert!(is_uuid(&fact.event_id));
        assert_eq!(fact.event_category, EventCategory::Fact);
        assert_eq!(fact.event_name, "RefundExecutedConfirmed");
        assert_eq!(fact.causation_id.as_deref(), Some(exec.event_id.as_str()));
        assert_eq!(fact.trace_id, "trace-1");
        assert_eq!(fact.subject, exec.subject);
        assert_eq!(fact.producer.producer_type, ProducerType::System);
        assert_eq!(fact.producer.id, DEFAULT_REACTOR_ID);
        assert_eq!(fact.producer.version, "execution-success-to-fact-v1");

        assert_eq!(fact.payload_str("observed_from"), Some("executor_feedback"));
        assert_eq!(fact.payload_str("derivation_rule_id"), Some("execution-success-to-fact"));
        assert_eq!(fact.payload_str("derivation_rule_version"), Some("v1"));
        assert_eq!(
            fact.payload_str("decision_id"),
            Some("6f1d2c3b-4a59-4e68-8b7a-0c9d8e7f6a5b")
        );
        assert_eq!(fact.payload_str("execution_id"), Some("exe-1"));
        assert_eq!(fact.payload["facts"]["external_reference"], "rf_123");
    }

    #[test]
    fn each_status_picks_its_rule() {
        let reactor = FactDerivationReactor::default();
        for (status, name) in [
            ("failed", "RefundExecutedFailed"),
            ("partial", "RefundExecutedPartiallyCompleted"),
            ("timeout", "RefundExecutedTimedOut"),
        ] {
            let fact = reactor.try_derive(&execution(status)).unwrap();
            assert_eq!(fact.event_name, name);
        }
    }

    #[test]
    fn unmatched_or_wrong_category_yields_none() {
        let reactor = FactDerivationReactor::default();
        assert!(reactor.try_derive(&execution("exploded")).is_none());

        let mut not_exec = execution("success");
        not_exec.event_category = EventCategory::Fact;
        assert!(reactor.try_derive(&not_exec).is_none());

        let empty = FactDerivationReactor::new(Vec::new(), "r");
        assert!(empty.try_derive(&execution("success")).is_none());
    }

    #[test]
    fn derivation_is_deterministic_apart_from_identity() {
        let reactor = FactDerivationReactor::default();
        let exec = execution("success");
        let a = reactor.try_derive(&exec).unwrap();
        let b = reactor.try_derive(&exec).unwrap();
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.event_name, b.event_name);
        assert_eq!(a.payload, b.payload);
    }
}
