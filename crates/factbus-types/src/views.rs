//! Read-side views folded from the log.
//!
//! A [`SubjectProjection`] has no identity of its own: it is the result of
//! folding one subject's slice of the log, and two folds over the same slice
//! compare equal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Aggregate state of one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SubjectProjection {
    /// Subject type the projection was requested for.
    pub subject_type: String,
    /// Subject id the projection was requested for.
    pub subject_id: String,
    /// Highest sequence number consumed by the fold.
    pub projection_version: u64,
    /// Every FACT about the subject, in log order.
    pub confirmed_facts: Vec<FactSnapshot>,
    /// Approved decisions no execution has referenced yet.
    pub pending_decisions: Vec<DecisionSnapshot>,
    /// Executions no derived fact has resolved yet.
    pub pending_executions: Vec<ExecutionSnapshot>,
}

/// A FACT as surfaced by a projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FactSnapshot {
    /// Envelope id of the fact.
    pub event_id: String,
    /// Envelope name of the fact.
    pub event_name: String,
    /// Log position of the fact.
    pub sequence_number: u64,
    /// When the fact occurred.
    pub occurred_at: DateTime<Utc>,
    /// `payload.observed_from`, empty if absent.
    pub observed_from: String,
    /// `payload.facts`, an empty object if absent.
    pub facts: Value,
}

/// An approved DECISION awaiting execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecisionSnapshot {
    /// Envelope id of the decision.
    pub event_id: String,
    /// `payload.decision_id`.
    pub decision_id: String,
    /// Always `approved` for pending decisions.
    pub outcome: String,
    /// Log position of the decision.
    pub sequence_number: u64,
    /// When the decision occurred.
    pub occurred_at: DateTime<Utc>,
    /// Proposals the decision ruled on.
    pub proposal_ids: Vec<String>,
}

/// An EXECUTION awaiting its derived fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ExecutionSnapshot {
    /// Envelope id of the execution.
    pub event_id: String,
    /// `payload.execution_id`.
    pub execution_id: String,
    /// `payload.status`.
    pub status: String,
    /// Log position of the execution.
    pub sequence_number: u64,
    /// When the execution occurred.
    pub occurred_at: DateTime<Utc>,
    /// Envelope id of the decision that was executed.
    pub decision_event_id: String,
}
