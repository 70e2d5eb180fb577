//! The pure projection fold.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use factbus_types::{
    DecisionOutcome, DecisionSnapshot, EventCategory, EventEnvelope, ExecutionSnapshot,
    FactSnapshot, ObservedFrom, SubjectProjection,
};

/// Fold a subject's envelopes, in log order, into its projection.
///
/// Envelopes about other subjects are ignored. Returns `None` when no
/// envelope concerns the subject.
pub fn fold(
    subject_type: &str,
    subject_id: &str,
    events: &[EventEnvelope],
) -> Option<SubjectProjection> {
    let mut state = FoldState::default();
    let mut seen_any = false;

    for event in events.iter().filter(|e| e.is_about(subject_type, subject_id)) {
        seen_any = true;
        state.apply(event);
    }

    seen_any.then(|| state.finish(subject_type, subject_id))
}

// ---------------------------------------------------------------------------
// Fold state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FoldState<'a> {
    projection_version: u64,
    confirmed_facts: Vec<FactSnapshot>,
    /// Approved decisions in log order.
    approved_decisions: Vec<&'a EventEnvelope>,
    /// Executions keyed by `execution_id`; a later execution with the same
    /// id replaces the earlier one but keeps its position.
    executions: Vec<(String, &'a EventEnvelope)>,
    execution_index: HashMap<String, usize>,
    /// Decision envelope ids referenced by some execution.
    executed_decisions: HashSet<String>,
    /// Execution ids resolved by a derived fact.
    derived_executions: HashSet<String>,
}

impl<'a> FoldState<'a> {
    fn apply(&mut self, event: &'a EventEnvelope) {
        let sequence = event.sequence_number.unwrap_or(0);
        self.projection_version = self.projection_version.max(sequence);

        match event.event_category {
            EventCategory::Fact => self.apply_fact(event, sequence),
            EventCategory::Decision => {
                if event.payload_str("outcome") == Some(DecisionOutcome::Approved.as_str()) {
                    self.approved_decisions.push(event);
                }
            }
            EventCategory::Execution => self.apply_execution(event),
            EventCategory::Proposal
            | EventCategory::Observation
            | EventCategory::ToolCall
            | EventCategory::ToolResult
            | EventCategory::AgentDiagnostic => {}
        }
    }

    fn apply_fact(&mut self, event: &EventEnvelope, sequence: u64) {
        let observed_from = event.payload_text("observed_from");
        if observed_from == ObservedFrom::ExecutorFeedback.as_str() {
            if let Some(execution_id) = event.payload_str("execution_id") {
                self.derived_executions.insert(execution_id.to_owned());
            }
        }

        let facts = event
            .payload_field("facts")
            .filter(|f| f.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        self.confirmed_facts.push(FactSnapshot {
            event_id: event.event_id.clone(),
            event_name: event.event_name.clone(),
            sequence_number: sequence,
            occurred_at: event.occurred_at,
            observed_from,
            facts,
        });
    }

    fn apply_execution(&mut self, event: &'a EventEnvelope) {
        let execution_id = event.payload_text("execution_id");
        self.executed_decisions
            .insert(event.payload_text("decision_event_id"));

        if let Some(&slot) = self.execution_index.get(&execution_id) {
            if let Some(entry) = self.executions.get_mut(slot) {
                entry.1 = event;
            }
        } else {
            self.execution_index
                .insert(execution_id.clone(), self.executions.len());
            self.executions.push((execution_id, event));
        }
    }

    fn finish(self, subject_type: &str, subject_id: &str) -> SubjectProjection {
        let pending_decisions = self
            .approved_decisions
            .iter()
            .filter(|d| !self.executed_decisions.contains(&d.event_id))
            .map(|d| DecisionSnapshot {
                event_id: d.event_id.clone(),
                decision_id: d.payload_text("decision_id"),
                outcome: DecisionOutcome::Approved.as_str().to_owned(),
                sequence_number: d.sequence_number.unwrap_or(0),
                occurred_at: d.occurred_at,
                proposal_ids: d
                    .payload_field("decision_on_proposals")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                    .unwrap_or_default(),
            })
            .collect();

        let pending_executions = self
            .executions
            .iter()
            .filter(|(id, _)| !self.derived_executions.contains(id))
            .map(|(id, e)| ExecutionSnapshot {
                event_id: e.event_id.clone(),
                execution_id: id.clone(),
                status: e.payload_text("status"),
                sequence_number: e.sequence_number.unwrap_or(0),
                occurred_at: e.occurred_at,
                decision_event_id: e.payload_text("decision_event_id"),
            })
            .collect();

        SubjectProjection {
            subject_type: subject_type.to_owned(),
            subject_id: subject_id.to_owned(),
            projection_version: self.projection_version,
            confirmed_facts: self.confirmed_facts,
            pending_decisions,
            pending_executions,
        }
    }
}
