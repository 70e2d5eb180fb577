//! Fact derivation for the factbus event log.
//!
//! The [`FactDerivationReactor`] turns an EXECUTION into the FACT that
//! records its outcome, so the execution stops being pending in
//! projections. It is bus infrastructure, not an agent: the reactor emits
//! as the `system` producer and every fact it derives names the rule that
//! produced it.
//!
//! Rules are pure functions of the execution envelope. No rule reads the
//! clock, the store, or anything outside its input; replaying the same
//! executions therefore derives the same facts.

pub mod reactor;
pub mod rules;

pub use reactor::{DEFAULT_REACTOR_ID, FactDerivationReactor};
pub use rules::{DerivationRule, DerivedFact, StatusDerivationRule, default_rules};
