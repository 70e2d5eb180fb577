//! Store-backed projection reads.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use factbus_store::{EventQuery, EventStore};
use factbus_types::{Subject, SubjectProjection};

use crate::ProjectionError;
use crate::fold::fold;

/// Envelopes scanned per projection unless configured otherwise.
pub const DEFAULT_SCAN_LIMIT: usize = 10_000;

/// Folds bounded slices of a store into [`SubjectProjection`]s.
#[derive(Clone)]
pub struct ProjectionEngine {
    store: Arc<dyn EventStore>,
    scan_limit: usize,
}

impl core::fmt::Debug for ProjectionEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProjectionEngine")
            .field("scan_limit", &self.scan_limit)
            .finish_non_exhaustive()
    }
}

impl ProjectionEngine {
    /// Create an engine reading at most `scan_limit` envelopes per subject.
    pub const fn new(store: Arc<dyn EventStore>, scan_limit: usize) -> Self {
        Self { store, scan_limit }
    }

    /// The configured scan bound.
    pub const fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    /// Project one subject; `Ok(None)` when the log holds nothing about it.
    pub fn get_projection(
        &self,
        subject_type: &str,
        subject_id: &str,
    ) -> Result<Option<SubjectProjection>, ProjectionError> {
        let query = EventQuery::new(self.scan_limit).subject(subject_type, subject_id);
        let events = self.store.query(&query)?;
        debug!(
            subject_type,
            subject_id,
            scanned = events.len(),
            "folding projection"
        );
        Ok(fold(subject_type, subject_id, &events))
    }

    /// Every subject appearing in the log, in first-seen order.
    pub fn distinct_subjects(&self) -> Result<Vec<Subject>, ProjectionError> {
        let events = self.store.query(&EventQuery::new(usize::MAX))?;
        let mut seen = HashSet::new();
        Ok(events
            .into_iter()
            .filter_map(|e| seen.insert(e.subject.clone()).then_some(e.subject))
            .collect())
    }
}
