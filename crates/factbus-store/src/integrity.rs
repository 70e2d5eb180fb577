//! Log integrity verification.
//!
//! A well-formed slice of the log has a sequence number on every envelope,
//! numbers that increase by exactly one from the first envelope onward, and
//! no repeated `event_id`. Append guarantees all three by construction;
//! this check guards a slice read back from a foreign or persistent store,
//! and is what replay verification runs on both sides.

use std::collections::HashSet;

use factbus_types::EventEnvelope;

use crate::LogAnomaly;

/// The result of an integrity check over a slice of the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogIntegrity {
    /// Sequence numbers are contiguous and ids are unique.
    Contiguous,
    /// The first violation found.
    Anomaly(LogAnomaly),
}

impl LogIntegrity {
    /// Whether the slice passed.
    pub const fn is_contiguous(&self) -> bool {
        matches!(self, Self::Contiguous)
    }
}

/// Verify a slice read from the log, in the order it was returned.
pub fn verify_log(events: &[EventEnvelope]) -> LogIntegrity {
    let mut seen: HashSet<&str> = HashSet::with_capacity(events.len());
    let mut expected: Option<u64> = None;

    for (position, event) in events.iter().enumerate() {
        let Some(sequence) = event.sequence_number else {
            return anomaly(position, event, "missing sequence number".to_owned());
        };

        if let Some(want) = expected {
            if sequence != want {
                return anomaly(
                    position,
                    event,
                    format!("sequence gap: expected {want}, found {sequence}"),
                );
            }
        }

        if !seen.insert(event.event_id.as_str()) {
            return anomaly(position, event, "duplicate event id".to_owned());
        }

        expected = match sequence.checked_add(1) {
            Some(next) => Some(next),
            None => return anomaly(position, event, "sequence number overflow".to_owned()),
        };
    }

    LogIntegrity::Contiguous
}

fn anomaly(position: usize, event: &EventEnvelope, detail: String) -> LogIntegrity {
    LogIntegrity::Anomaly(LogAnomaly {
        position,
        event_id: event.event_id.clone(),
        message: format!("LOG_ANOMALY at position {position} ({}): {detail}", event.event_id),
    })
}
