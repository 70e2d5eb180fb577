//! Per-subject projections folded from the factbus event log.
//!
//! The log is the source of truth; a projection is only the result of
//! folding one subject's slice of it. Replaying the same envelopes into an
//! empty store and folding again yields an identical projection, which is
//! what replay verification checks.
//!
//! # Modules
//!
//! - [`fold`] -- The pure fold from envelopes to a [`SubjectProjection`].
//! - [`engine`] -- The [`ProjectionEngine`], which reads a bounded slice
//!   from an [`EventStore`](factbus_store::EventStore) and folds it.
//!
//! # Pending semantics
//!
//! - An approved DECISION is pending until an EXECUTION references its
//!   envelope id as `decision_event_id`.
//! - An EXECUTION is pending until a FACT with
//!   `observed_from = executor_feedback` carries its `execution_id`.
//!
//! [`SubjectProjection`]: factbus_types::SubjectProjection

pub mod engine;
pub mod fold;

pub use engine::{DEFAULT_SCAN_LIMIT, ProjectionEngine};
pub use fold::fold;

use factbus_store::StoreError;

/// Errors raised while building a projection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    /// The log slice could not be read.
    #[error("failed to read event log: {0}")]
    Store(#[from] StoreError),
}
