//! Retry feedback attached to rejected decisions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use ts_rs::TS;

use crate::enums::{ObservedFrom, TrustTier};

/// What a future proposal would need in order to pass the policy that
/// rejected this one. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RetryHint {
    /// Fact event ids (or keys) that were missing or stale.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fact_keys: Vec<String>,
    /// Minimum evidence tier the retry must rely on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_trust_tier: Option<String>,
    /// Sources the retry should observe from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_sources: Vec<String>,
    /// Maximum age, in milliseconds, of facts the retry may cite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observation_age_ms: Option<i64>,
}

impl RetryHint {
    /// A hint that only demands a trust tier.
    pub fn tier(tier: TrustTier) -> Self {
        Self {
            required_trust_tier: Some(tier.as_str().to_owned()),
            ..Self::default()
        }
    }

    /// Add missing or stale fact keys.
    #[must_use]
    pub fn missing<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_fact_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Add preferred sources.
    #[must_use]
    pub fn sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = ObservedFrom>,
    {
        self.preferred_sources
            .extend(sources.into_iter().map(|s| s.as_str().to_owned()));
        self
    }

    /// Set the maximum observation age.
    #[must_use]
    pub const fn max_age_ms(mut self, max_age_ms: i64) -> Self {
        self.max_observation_age_ms = Some(max_age_ms);
        self
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.missing_fact_keys.is_empty()
            && self.required_trust_tier.is_none()
            && self.preferred_sources.is_empty()
            && self.max_observation_age_ms.is_none()
    }

    /// The hint as a decision payload value.
    ///
    /// A rejected decision must always carry a hint object, so an empty hint
    /// renders as `{"missing_fact_keys": []}` rather than `{}`.
    pub fn to_value(&self) -> Value {
        if self.is_empty() {
            return json!({ "missing_fact_keys": [] });
        }
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(_) => Value::Object(Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hint_renders_missing_fact_keys() {
        let value = RetryHint::default().to_value();
        assert_eq!(value, json!({ "missing_fact_keys": [] }));
    }

    #[test]
    fn tier_only_hint() {
        let value = RetryHint::tier(TrustTier::Tier1).to_value();
        assert_eq!(value, json!({ "required_trust_tier": "tier_1" }));
    }

    #[test]
    fn full_hint() {
        let hint = RetryHint::tier(TrustTier::Tier1)
            .missing(["evt-1"])
            .sources([ObservedFrom::Db, ObservedFrom::Api])
            .max_age_ms(60_000);
        assert_eq!(
            hint.to_value(),
            json!({
                "missing_fact_keys": ["evt-1"],
                "required_trust_tier": "tier_1",
                "preferred_sources": ["db", "api"],
                "max_observation_age_ms": 60000
            })
        );
    }
}
