//! The event store: an append-only, sequenced log of envelopes.
//!
//! [`EventStore`] is the only interface the rest of the bus consumes, so a
//! persistent backend can replace [`InMemoryEventStore`] as long as it
//! keeps append linearized.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use factbus_types::EventEnvelope;

use crate::{EventQuery, StoreError};

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// An ordered, append-only envelope log.
///
/// Implementations must linearize [`append`](EventStore::append): sequence
/// numbers are gapless and unique under concurrent callers, and no reader
/// observes a sequence number before its envelope is fully stored.
pub trait EventStore: Send + Sync {
    /// Assign the next sequence number and append.
    ///
    /// Fails with [`StoreError::DuplicateEventId`] if the id is already
    /// present; the check and the insert are one atomic step.
    fn append(&self, envelope: EventEnvelope) -> Result<EventEnvelope, StoreError>;

    /// Whether an envelope with this id has been appended.
    fn exists_by_event_id(&self, event_id: &str) -> Result<bool, StoreError>;

    /// Envelopes matching `query`, in insertion order, capped at its limit.
    fn query(&self, query: &EventQuery) -> Result<Vec<EventEnvelope>, StoreError>;

    /// Envelopes with `from <= sequence_number <= to`, in order, capped at
    /// `limit`. Empty if `to < from` or `limit == 0`.
    fn query_by_sequence_range(
        &self,
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>, StoreError>;

    /// Highest assigned sequence number, `0` when empty.
    fn latest_sequence(&self) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LogState {
    /// Envelopes in sequence order; `events[i]` has sequence number `i + 1`.
    events: Vec<EventEnvelope>,
    /// Ids present in `events`.
    ids: HashSet<String>,
}

/// Process-local [`EventStore`] backed by a vector under a read-write lock.
///
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    state: RwLock<LogState>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored envelopes.
    pub fn len(&self) -> usize {
        self.read().map_or(0, |state| state.events.len())
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LogState>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LogState>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, mut envelope: EventEnvelope) -> Result<EventEnvelope, StoreError> {
        let mut state = self.write()?;

        if state.ids.contains(&envelope.event_id) {
            return Err(StoreError::DuplicateEventId {
                event_id: envelope.event_id,
            });
        }

        let sequence = u64::try_from(state.events.len())
            .ok()
            .and_then(|len| len.checked_add(1))
            .ok_or(StoreError::SequenceExhausted)?;

        envelope.sequence_number = Some(sequence);
        state.ids.insert(envelope.event_id.clone());
        state.events.push(envelope.clone());
        drop(state);

        debug!(
            event_id = %envelope.event_id,
            sequence_number = sequence,
            category = %envelope.event_category,
            "envelope appended"
        );
        Ok(envelope)
    }

    fn exists_by_event_id(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.ids.contains(event_id))
    }

    fn query(&self, query: &EventQuery) -> Result<Vec<EventEnvelope>, StoreError> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }
        let state = self.read()?;
        Ok(state
            .events
            .iter()
            .filter(|e| query.matches(e))
            .take(query.limit)
            .cloned()
            .collect())
    }

    fn query_by_sequence_range(
        &self,
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<EventEnvelope>, StoreError> {
        if to < from || limit == 0 {
            return Ok(Vec::new());
        }
        let skip = usize::try_from(from.saturating_sub(1)).unwrap_or(usize::MAX);
        let state = self.read()?;
        Ok(state
            .events
            .iter()
            .skip(skip)
            .take_while(|e| e.sequence_number.is_some_and(|s| s <= to))
            .take(limit)
            .cloned()
            .collect())
    }

    fn latest_sequence(&self) -> Result<u64, StoreError> {
        let state = self.read()?;
        Ok(state
            .events
            .last()
            .and_then(|e| e.sequence_number)
            .unwrap_or(0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use factbus_types::{EnvelopeBuilder, EventCategory, ProducerType};

    use super::*;

    fn fact(event_id: &str, subject_id: &str) -> EventEnvelope {
        EnvelopeBuilder::new(EventCategory::Fact, "Seen")
            .event_id(event_id)
            .producer(ProducerType::Sensor, "s-1", "v1")
            .subject("order", subject_id)
            .trace_id("trace-1")
            .build()
    }

    fn seeded(n: u64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        for i in 1..=n {
            store.append(fact(&format!("e-{i}"), "ORD-1")).unwrap();
        }
        store
    }

    #[test]
    fn sequence_starts_at_one() {
        let store = InMemoryEventStore::new();
        assert_eq!(store.latest_sequence().unwrap(), 0);
        let stored = store.append(fact("e-1", "ORD-1")).unwrap();
        assert_eq!(stored.sequence_number, Some(1));
        assert_eq!(store.latest_sequence().unwrap(), 1);
    }

    #[test]
    fn duplicate_append_is_rejected_without_mutation() {
        let store = seeded(1);
        let err = store.append(fact("e-1", "ORD-2")).unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateEventId {
                event_id: "e-1".to_owned()
            }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.latest_sequence().unwrap(), 1);
    }

    #[test]
    fn exists_by_event_id() {
        let store = seeded(2);
        assert!(store.exists_by_event_id("e-2").unwrap());
        assert!(!store.exists_by_event_id("e-3").unwrap());
    }

    #[test]
    fn query_respects_limit_and_order() {
        let store = seeded(5);
        let events = store.query(&EventQuery::new(3)).unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, ["e-1", "e-2", "e-3"]);
        assert!(store.query(&EventQuery::new(0)).unwrap().is_empty());
    }

    #[test]
    fn query_filters_by_subject() {
        let store = seeded(2);
        store.append(fact("other", "ORD-2")).unwrap();
        let events = store
            .query(&EventQuery::new(10).subject("order", "ORD-2"))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events.first().unwrap().sequence_number, Some(3));
    }

    #[test]
    fn sequence_range_is_contiguous() {
        let store = seeded(10);
        let seqs: Vec<_> = store
            .query_by_sequence_range(3, 6, 100)
            .unwrap()
            .iter()
            .filter_map(|e| e.sequence_number)
            .collect();
        assert_eq!(seqs, [3, 4, 5, 6]);

        let capped = store.query_by_sequence_range(3, 6, 2).unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn sequence_range_edge_cases() {
        let store = seeded(3);
        assert!(store.query_by_sequence_range(3, 2, 10).unwrap().is_empty());
        assert!(store.query_by_sequence_range(1, 3, 0).unwrap().is_empty());
        assert_eq!(store.query_by_sequence_range(0, 1, 10).unwrap().len(), 1);
        assert!(store.query_by_sequence_range(4, 9, 10).unwrap().is_empty());
    }

    #[test]
    fn concurrent_appends_are_gapless() {
        let store = InMemoryEventStore::new();
        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..50 {
                        store.append(fact(&format!("t{t}-{i}"), "ORD-1")).unwrap();
                    }
                });
            }
        });
        let all = store.query_by_sequence_range(1, 400, 400).unwrap();
        let seqs: Vec<u64> = all.iter().filter_map(|e| e.sequence_number).collect();
        let expected: Vec<u64> = (1..=400).collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn concurrent_duplicate_appends_admit_exactly_one() {
        let store = InMemoryEventStore::new();
        let wins = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    if store.append(fact("same", "ORD-1")).is_ok() {
                        wins.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(wins.into_inner(), 1);
        assert_eq!(store.len(), 1);
    }
}
