//! The derivation rule capability and the default status ruleset.

use serde_json::{Map, Value};

use factbus_types::{EventEnvelope, ExecutionStatus};

/// Output of a rule: the derived fact's name and its `facts` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFact {
    /// `event_name` of the derived FACT.
    pub event_name: String,
    /// `payload.facts` of the derived FACT.
    pub facts: Map<String, Value>,
}

/// A pure, versioned transformation from an execution to fact content.
pub trait DerivationRule: Send + Sync {
    /// Stable identifier recorded on derived facts.
    fn rule_id(&self) -> &str;

    /// Version recorded on derived facts.
    fn rule_version(&self) -> &str;

    /// Whether the rule applies to `execution`.
    fn matches(&self, execution: &EventEnvelope) -> bool;

    /// Derive fact content. Only called after [`matches`](Self::matches)
    /// returned `true`.
    fn derive(&self, execution: &EventEnvelope) -> DerivedFact;
}

/// Execution payload fields forwarded into derived facts when present.
const FORWARDED_FIELDS: &[&str] = &["external_reference", "error_code", "error_message"];

/// Matches one `payload.status` value and names the fact with a fixed
/// suffix, e.g. `RefundExecuted` + `Confirmed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDerivationRule {
    rule_id: String,
    rule_version: String,
    status: ExecutionStatus,
    suffix: String,
}

impl StatusDerivationRule {
    /// Create a rule for `status`.
    pub fn new(
        rule_id: impl Into<String>,
        rule_version: impl Into<String>,
        status: ExecutionStatus,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            rule_version: rule_version.into(),
            status,
            suffix: suffix.into(),
        }
    }
}

impl DerivationRule for StatusDerivationRule {
    fn rule_id(&self) -> &str {
        &self.rule_id
    }

    fn rule_version(&self) -> &str {
        &self.rule_version
    }

    fn matches(&self, execution: &EventEnvelope) -> bool {
        execution.payload_str("status") == Some(self.status.as_str())
    }

    fn derive(&self, execution: &EventEnvelope) -> DerivedFact {
        let mut facts = Map::new();
        facts.insert(
            "execution_status".to_owned(),
            execution.payload_field("status").cloned().unwrap_or(Value::Null),
        );
        facts.insert(
            "executor".to_owned(),
            execution.payload_field("executor").cloned().unwrap_or(Value::Null),
        );
        for key in FORWARDED_FIELDS {
            if let Some(value) = execution.payload_field(key) {
                facts.insert((*key).to_owned(), value.clone());
            }
        }

        let base = execution
            .event_name
            .strip_suffix("Event")
            .unwrap_or(&execution.event_name);

        DerivedFact {
            event_name: format!("{base}{}", self.suffix),
            facts,
        }
    }
}

/// One rule per execution status, all at version `v1`.
///
/// | status | rule id | name suffix |
/// |---|---|---|
/// | `success` | `execution-success-to-fact` | `Confirmed` |
/// | `failed` | `execution-failed-to-fact` | `Failed` |
/// | `partial` | `execution-partial-to-fact` | `PartiallyCompleted` |
/// | `timeout` | `execution-timeout-to-fact` | `TimedOut` |
pub fn default_rules() -> Vec<Box<dyn DerivationRule>> {
    [
        (ExecutionStatus::Success, "Confirmed"),
        (ExecutionStatus::Failed, "Failed"),
        (ExecutionStatus::Partial, "PartiallyCompleted"),
        (ExecutionStatus::Timeout, "TimedOut"),
    ]
    .into_iter()
    .map(|(status, suffix)| {
        Box::new(StatusDerivationRule::new(
            format!("execution-{status}-to-fact"),
            "v1",
            status,
            suffix,
        )) as Box<dyn DerivationRule>
    })
    .collect()
}
