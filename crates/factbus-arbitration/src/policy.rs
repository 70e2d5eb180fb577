//! The policy capability and the built-in policies.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use factbus_types::{EventEnvelope, ObservedFrom, RetryHint, RiskLevel, TrustTier};

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Outcome of evaluating one policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// The proposal satisfies the policy.
    Pass,
    /// The proposal violates the policy.
    Reject {
        /// Machine-readable reason, e.g. `STALE_FACT`.
        reason_code: String,
        /// What a retry would need in order to pass.
        retry_hint: RetryHint,
    },
}

impl PolicyVerdict {
    /// Build a rejection.
    pub fn reject(reason_code: impl Into<String>, retry_hint: RetryHint) -> Self {
        Self::Reject {
            reason_code: reason_code.into(),
            retry_hint,
        }
    }
}

/// A deterministic rule evaluated against a proposal and the subject's
/// current facts.
pub trait ArbitrationPolicy: Send + Sync {
    /// Stable identifier recorded on decisions.
    fn policy_id(&self) -> &str;

    /// Version recorded on decisions.
    fn policy_version(&self) -> &str;

    /// Evaluate `proposal` against `current_facts`.
    fn evaluate(&self, proposal: &EventEnvelope, current_facts: &[EventEnvelope]) -> PolicyVerdict;
}

/// Read a JSON number as an exact decimal. Non-numbers yield `None`.
pub fn json_decimal(value: &Value) -> Option<Decimal> {
    if let Some(i) = value.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = value.as_u64() {
        return Some(Decimal::from(u));
    }
    value.as_f64().and_then(|f| Decimal::try_from(f).ok())
}

/// Whether the JSON number `value` is strictly greater than `threshold`.
///
/// Numbers outside the decimal range are compared as floats. Non-numbers
/// never exceed.
pub fn json_exceeds(value: &Value, threshold: Decimal) -> bool {
    if let Some(exact) = json_decimal(value) {
        return exact > threshold;
    }
    match (value.as_f64(), threshold.to_f64()) {
        (Some(float), Some(limit)) => float > limit,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Fact freshness
// ---------------------------------------------------------------------------

/// Rejects a proposal when any current fact is older than the proposal's
/// declared `max_fact_age_ms`, measured from the proposal's `occurred_at`.
///
/// Passes when no bound is declared or the proposal cites no facts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactFreshnessPolicy;

impl FactFreshnessPolicy {
    /// Policy id.
    pub const ID: &'static str = "fact-freshness-check";
    /// Policy version.
    pub const VERSION: &'static str = "v1";
    /// Reason code of a rejection.
    pub const STALE_FACT: &'static str = "STALE_FACT";
}

impl ArbitrationPolicy for FactFreshnessPolicy {
    fn policy_id(&self) -> &str {
        Self::ID
    }

    fn policy_version(&self) -> &str {
        Self::VERSION
    }

    fn evaluate(&self, proposal: &EventEnvelope, current_facts: &[EventEnvelope]) -> PolicyVerdict {
        let Some(max_age_ms) = proposal
            .payload_field("max_fact_age_ms")
            .and_then(json_decimal)
            .and_then(|d| d.trunc().to_i64())
        else {
            return PolicyVerdict::Pass;
        };

        let cites_facts = proposal
            .payload_field("based_on_events")
            .and_then(Value::as_array)
            .is_some_and(|ids| !ids.is_empty());
        if !cites_facts {
            return PolicyVerdict::Pass;
        }

        for fact in current_facts {
            let age_ms = proposal
                .occurred_at
                .signed_duration_since(fact.occurred_at)
                .num_milliseconds();
            if age_ms > max_age_ms {
                return PolicyVerdict::reject(
                    Self::STALE_FACT,
                    RetryHint::tier(TrustTier::Tier1)
                        .missing([fact.event_id.as_str()])
                        .sources([ObservedFrom::Db, ObservedFrom::Api])
                        .max_age_ms(max_age_ms),
                );
            }
        }
        PolicyVerdict::Pass
    }
}

// ---------------------------------------------------------------------------
// Risk-cost limit
// ---------------------------------------------------------------------------

/// Rejects critical-risk proposals whose `cost_estimate` exceeds a
/// threshold.
#[derive(Debug, Clone, Copy)]
pub struct RiskCostLimitPolicy {
    threshold: Decimal,
}

impl RiskCostLimitPolicy {
    /// Policy id.
    pub const ID: &'static str = "risk-cost-limit";
    /// Policy version.
    pub const VERSION: &'static str = "v1";
    /// Reason code of a rejection.
    pub const COST_EXCEEDED: &'static str = "CRITICAL_RISK_COST_EXCEEDED";

    /// Create the policy with the given critical cost threshold.
    pub const fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }
}

impl Default for RiskCostLimitPolicy {
    fn default() -> Self {
        Self::new(Decimal::from(10_000))
    }
}

impl ArbitrationPolicy for RiskCostLimitPolicy {
    fn policy_id(&self) -> &str {
        Self::ID
    }

    fn policy_version(&self) -> &str {
        Self::VERSION
    }

    fn evaluate(&self, proposal: &EventEnvelope, _current_facts: &[EventEnvelope]) -> PolicyVerdict {
        let critical = proposal
            .payload_str("risk_level")
            .and_then(RiskLevel::from_wire)
            == Some(RiskLevel::Critical);
        let over = proposal
            .payload_field("cost_estimate")
            .is_some_and(|cost| json_exceeds(cost, self.threshold));

        if critical && over {
            PolicyVerdict::reject(Self::COST_EXCEEDED, RetryHint::tier(TrustTier::Tier1))
        } else {
            PolicyVerdict::Pass
        }
    }
}
