//! Deterministic arbitration of proposals.
//!
//! The [`ArbitrationEngine`] evaluates a PROPOSAL against an ordered chain
//! of [`ArbitrationPolicy`] values and produces a DECISION envelope. The
//! first policy that rejects decides the outcome; policy order is therefore
//! part of the deployment, not an implementation detail. If every policy
//! passes, the proposal is approved and credited to the first policy.
//!
//! Policies never call out, sleep, or draw randomness: given the same
//! proposal and facts, the chain always reaches the same verdict.
//!
//! # Built-in policies
//!
//! - [`FactFreshnessPolicy`] -- rejects `STALE_FACT` when a current fact is
//!   older than the proposal's `max_fact_age_ms`.
//! - [`RiskCostLimitPolicy`] -- rejects `CRITICAL_RISK_COST_EXCEEDED` when a
//!   critical-risk proposal costs more than a threshold.

pub mod engine;
pub mod policy;

pub use engine::{ArbitrationEngine, DecisionProducer};
pub use policy::{ArbitrationPolicy, FactFreshnessPolicy, PolicyVerdict, RiskCostLimitPolicy};

use factbus_types::EventCategory;

/// Reason code of an approved decision.
pub const ALL_POLICIES_PASSED: &str = "ALL_POLICIES_PASSED";

/// Policy id credited when the chain is empty.
pub const NO_POLICY_ID: &str = "no-policy";

/// Policy version credited when the chain is empty.
pub const NO_POLICY_VERSION: &str = "v0";

/// Errors raised by [`ArbitrationEngine::arbitrate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArbitrationError {
    /// Only PROPOSAL envelopes can be arbitrated.
    #[error("can only arbitrate PROPOSAL events, got {category}")]
    NotAProposal {
        /// The category that was supplied.
        category: EventCategory,
    },
}
