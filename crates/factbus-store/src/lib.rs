//! Append-only event store for the factbus event log.
//!
//! Every envelope the bus accepts lands here exactly once. The store assigns
//! each envelope a sequence number from a single monotonic counter: starting
//! at 1, strictly increasing, no gaps, never reused. There is no update or
//! delete operation.
//!
//! # Architecture
//!
//! - [`store`] -- The [`EventStore`] trait and the [`InMemoryEventStore`].
//! - [`query`] -- The [`EventQuery`] filter builder.
//! - [`integrity`] -- Sequence contiguity and id uniqueness verification.
//!
//! # Concurrency
//!
//! Append is the single serialization point. The duplicate check, sequence
//! assignment and insertion happen under one write lock, so two concurrent
//! appends of the same `event_id` cannot both succeed and readers never see
//! a sequence number whose envelope is not fully stored.
//!
//! # Usage
//!
//! ```
//! use factbus_store::{EventQuery, EventStore, InMemoryEventStore};
//! use factbus_types::{EnvelopeBuilder, EventCategory, ProducerType};
//!
//! let store = InMemoryEventStore::new();
//! let fact = EnvelopeBuilder::new(EventCategory::Fact, "Seen")
//!     .producer(ProducerType::Sensor, "s-1", "v1")
//!     .subject("order", "ORD-1")
//!     .build();
//!
//! let stored = store.append(fact).ok();
//! assert_eq!(stored.and_then(|e| e.sequence_number), Some(1));
//!
//! let found = store.query(&EventQuery::new(10).subject("order", "ORD-1")).ok();
//! assert_eq!(found.map(|events| events.len()), Some(1));
//! ```

pub mod integrity;
pub mod query;
pub mod store;

// Re-export primary types at crate root.
pub use integrity::{LogIntegrity, verify_log};
pub use query::EventQuery;
pub use store::{EventStore, InMemoryEventStore};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when reading from or appending to the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An envelope with this id is already in the log.
    #[error("event already exists: {event_id}")]
    DuplicateEventId {
        /// The conflicting event id.
        event_id: String,
    },

    /// The sequence counter cannot be advanced any further.
    #[error("sequence counter exhausted")]
    SequenceExhausted,

    /// The store cannot serve requests (e.g. a poisoned lock).
    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A log integrity violation found by [`verify_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAnomaly {
    /// Index of the offending envelope in the verified slice.
    pub position: usize,
    /// Id of the offending envelope.
    pub event_id: String,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LogAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
