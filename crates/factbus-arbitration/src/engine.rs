//! The arbitration engine: policy chain evaluation and decision building.

use serde_json::{Map, Value, json};
use tracing::info;

use factbus_types::{
    DecisionOutcome, EnvelopeBuilder, EventCategory, EventEnvelope, ProducerType, RetryHint,
    short_token,
};

use crate::policy::{ArbitrationPolicy, PolicyVerdict};
use crate::{ALL_POLICIES_PASSED, ArbitrationError, NO_POLICY_ID, NO_POLICY_VERSION};

/// Producer identity stamped on generated decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionProducer {
    /// `producer.id` of decisions.
    pub id: String,
    /// `producer.version` of decisions.
    pub version: String,
}

impl Default for DecisionProducer {
    fn default() -> Self {
        Self {
            id: "policy-arbitrator".to_owned(),
            version: "v1".to_owned(),
        }
    }
}

/// Evaluates proposals against an ordered policy chain.
pub struct ArbitrationEngine {
    policies: Vec<Box<dyn ArbitrationPolicy>>,
    producer: DecisionProducer,
}

impl core::fmt::Debug for ArbitrationEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArbitrationEngine")
            .field("policies", &self.policy_ids())
            .field("producer", &self.producer)
            .finish()
    }
}

impl ArbitrationEngine {
    /// Create an engine with the given chain, evaluated in order.
    pub fn new(policies: Vec<Box<dyn ArbitrationPolicy>>, producer: DecisionProducer) -> Self {
        Self { policies, producer }
    }

    /// Ids of the configured policies, in evaluation order.
    pub fn policy_ids(&self) -> Vec<&str> {
        self.policies.iter().map(|p| p.policy_id()).collect()
    }

    /// Arbitrate `proposal` against the subject's `current_facts`.
    ///
    /// Returns an unappended DECISION envelope: `causation_id` is the
    /// proposal's id, trace and subject are inherited from it.
    pub fn arbitrate(
        &self,
        proposal: &EventEnvelope,
        current_facts: &[EventEnvelope],
    ) -> Result<EventEnvelope, ArbitrationError> {
        if proposal.event_category != EventCategory::Proposal {
            return Err(ArbitrationError::NotAProposal {
                category: proposal.event_category,
            });
        }

        let proposal_id = proposal.payload_str("proposal_id").unwrap_or("unknown");

        for policy in &self.policies {
            if let PolicyVerdict::Reject {
                reason_code,
                retry_hint,
            } = policy.evaluate(proposal, current_facts)
            {
                info!(
                    proposal_id,
                    policy_id = policy.policy_id(),
                    policy_version = policy.policy_version(),
                    reason_code = %reason_code,
                    "proposal rejected"
                );
                return Ok(self.build_decision(
                    proposal,
                    proposal_id,
                    Verdict {
                        outcome: DecisionOutcome::Rejected,
                        policy_id: policy.policy_id(),
                        policy_version: policy.policy_version(),
                        reason_code: &reason_code,
                        retry_hint: Some(&retry_hint),
                    },
                ));
            }
        }

        let (policy_id, policy_version) = self.policies.first().map_or(
            (NO_POLICY_ID, NO_POLICY_VERSION),
            |p| (p.policy_id(), p.policy_version()),
        );
        info!(
            proposal_id,
            policies = self.policies.len(),
            "proposal approved"
        );
        Ok(self.build_decision(
            proposal,
            proposal_id,
            Verdict {
                outcome: DecisionOutcome::Approved,
                policy_id,
                policy_version,
                reason_code: ALL_POLICIES_PASSED,
                retry_hint: None,
            },
        ))
    }

    fn build_decision(
        &self,
        proposal: &EventEnvelope,
        proposal_id: &str,
        verdict: Verdict<'_>,
    ) -> EventEnvelope {
        let mut payload = Map::new();
        payload.insert(
            "decision_id".to_owned(),
            json!(format!("dec-{}", short_token())),
        );
        payload.insert("decision_on_proposals".to_owned(), json!([proposal_id]));
        payload.insert("outcome".to_owned(), json!(verdict.outcome.as_str()));
        payload.insert("policy_id".to_owned(), json!(verdict.policy_id));
        payload.insert("policy_version".to_owned(), json!(verdict.policy_version));
        payload.insert("reason_code".to_owned(), json!(verdict.reason_code));
        if verdict.outcome == DecisionOutcome::Rejected {
            let hint = verdict.retry_hint.map_or_else(
                || RetryHint::default().to_value(),
                RetryHint::to_value,
            );
            payload.insert("retry_hint".to_owned(), hint);
        }
        payload.insert("active_policy_ids".to_owned(), json!(self.policy_ids()));

        let event_name = match verdict.outcome {
            DecisionOutcome::Approved => "ProposalApproved",
            DecisionOutcome::Rejected => "ProposalRejected",
        };

        EnvelopeBuilder::new(EventCategory::Decision, event_name)
            .schema_version(proposal.schema_version.clone())
            .trace_id(proposal.trace_id.clone())
            .causation_id(proposal.event_id.clone())
            .producer(
                ProducerType::Arbitrator,
                self.producer.id.clone(),
                self.producer.version.clone(),
            )
            .subject_key(proposal.subject.clone())
            .payload(Value::Object(payload))
            .build()
    }
}

/// The chain's verdict, ready to be written into a decision payload.
struct Verdict<'a> {
    outcome: DecisionOutcome,
    policy_id: &'a str,
    policy_version: &'a str,
    reason_code: &'a str,
    retry_hint: Option<&'a RetryHint>,
}
