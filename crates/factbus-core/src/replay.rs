//! Replay verification.
//!
//! Copies a log, in sequence order, into an empty store and checks that
//! every subject folds to the same projection in both. Sequence numbers
//! are reassigned by the target store; ids and content are kept. Both the
//! source log and the replayed log must also pass [`verify_log`].

use std::sync::Arc;

use tracing::{info, warn};

use factbus_projection::ProjectionEngine;
use factbus_store::{EventStore, InMemoryEventStore, LogAnomaly, LogIntegrity, verify_log};
use factbus_types::{EventEnvelope, Subject, SubjectProjection};

use crate::error::BusError;

/// A subject whose replayed projection differs from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    /// The subject concerned.
    pub subject: Subject,
    /// Which section differs: `presence`, `confirmed_facts`,
    /// `pending_decisions` or `pending_executions`.
    pub section: &'static str,
}

impl core::fmt::Display for ReplayMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {} differs after replay", self.subject, self.section)
    }
}

/// Outcome of [`verify_replay`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Envelopes copied into the replay store.
    pub events_replayed: usize,
    /// Subjects whose projections were compared.
    pub subjects_checked: usize,
    /// Subjects whose projections differ.
    pub mismatches: Vec<ReplayMismatch>,
    /// Integrity violations in the source or the replayed log.
    pub log_anomalies: Vec<LogAnomaly>,
}

impl ReplayReport {
    /// Whether both logs are intact and every subject replayed identically.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.log_anomalies.is_empty()
    }
}

/// Replay `source` into a fresh in-memory store and compare projections.
///
/// # Errors
///
/// [`BusError::Internal`] if either store fails or an envelope cannot be
/// re-appended.
pub fn verify_replay(
    source: &Arc<dyn EventStore>,
    scan_limit: usize,
) -> Result<ReplayReport, BusError> {
    let latest = source.latest_sequence()?;
    let log = source.query_by_sequence_range(1, latest, usize::MAX)?;

    let target: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    for envelope in &log {
        target.append(envelope.detached()).map_err(|e| {
            BusError::Internal(format!("replay append of {} failed: {e}", envelope.event_id))
        })?;
    }

    let replayed_log = target.query_by_sequence_range(1, target.latest_sequence()?, usize::MAX)?;
    let log_anomalies: Vec<LogAnomaly> = [("source", &log), ("replay", &replayed_log)]
        .into_iter()
        .filter_map(|(side, events)| integrity_anomaly(side, events))
        .collect();

    let original = ProjectionEngine::new(Arc::clone(source), scan_limit);
    let replayed = ProjectionEngine::new(target, scan_limit);

    let subjects = original.distinct_subjects()?;
    let mut mismatches = Vec::new();
    for subject in &subjects {
        let a = original.get_projection(&subject.subject_type, &subject.id)?;
        let b = replayed.get_projection(&subject.subject_type, &subject.id)?;
        if let Some(section) = differing_section(a.as_ref(), b.as_ref()) {
            warn!(subject = %subject, section, "projection differs after replay");
            mismatches.push(ReplayMismatch {
                subject: subject.clone(),
                section,
            });
        }
    }

    let report = ReplayReport {
        events_replayed: log.len(),
        subjects_checked: subjects.len(),
        mismatches,
        log_anomalies,
    };
    info!(
        events_replayed = report.events_replayed,
        subjects_checked = report.subjects_checked,
        mismatches = report.mismatches.len(),
        log_anomalies = report.log_anomalies.len(),
        "replay verification finished"
    );
    Ok(report)
}

fn integrity_anomaly(side: &'static str, events: &[EventEnvelope]) -> Option<LogAnomaly> {
    match verify_log(events) {
        LogIntegrity::Contiguous => None,
        LogIntegrity::Anomaly(anomaly) => {
            warn!(side, %anomaly, "log integrity violated");
            Some(anomaly)
        }
    }
}

/// First differing section, comparing the content replay must preserve.
fn differing_section(
    a: Option<&SubjectProjection>,
    b: Option<&SubjectProjection>,
) -> Option<&'static str> {
    match (a, b) {
        (None, None) => None,
        (Some(a), Some(b)) => {
            let fact_ids = |p: &SubjectProjection| -> Vec<String> {
                p.confirmed_facts.iter().map(|f| f.event_id.clone()).collect()
            };
            let facts = |p: &SubjectProjection| -> Vec<(String, serde_json::Value)> {
                p.confirmed_facts
                    .iter()
                    .map(|f| (f.observed_from.clone(), f.facts.clone()))
                    .collect()
            };
            let decisions = |p: &SubjectProjection| -> Vec<(String, String, Vec<String>)> {
                p.pending_decisions
                    .iter()
                    .map(|d| (d.event_id.clone(), d.decision_id.clone(), d.proposal_ids.clone()))
                    .collect()
            };
            let executions = |p: &SubjectProjection| -> Vec<(String, String, String)> {
                p.pending_executions
                    .iter()
                    .map(|e| (e.event_id.clone(), e.execution_id.clone(), e.status.clone()))
                    .collect()
            };

            if fact_ids(a) != fact_ids(b) || facts(a) != facts(b) {
                Some("confirmed_facts")
            } else if decisions(a) != decisions(b) {
                Some("pending_decisions")
            } else if executions(a) != executions(b) {
                Some("pending_executions")
            } else {
                None
            }
        }
        _ => Some("presence"),
    }
}
