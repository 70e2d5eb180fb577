//! Filter builder for [`EventStore::query`](crate::EventStore::query).

use factbus_types::{EventCategory, EventEnvelope};

/// Conjunctive filter over the log. Absent filters match everything.
///
/// # Examples
///
/// ```
/// use factbus_store::EventQuery;
/// use factbus_types::EventCategory;
///
/// let query = EventQuery::new(100)
///     .category(EventCategory::Fact)
///     .subject("order", "ORD-1");
///
/// assert_eq!(query.limit, 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Match only this trace.
    pub trace_id: Option<String>,
    /// Match only this category.
    pub category: Option<EventCategory>,
    /// Match only this subject type.
    pub subject_type: Option<String>,
    /// Match only this subject id.
    pub subject_id: Option<String>,
    /// Maximum number of envelopes returned; `0` returns nothing.
    pub limit: usize,
}

impl EventQuery {
    /// An unfiltered query returning at most `limit` envelopes.
    pub const fn new(limit: usize) -> Self {
        Self {
            trace_id: None,
            category: None,
            subject_type: None,
            subject_id: None,
            limit,
        }
    }

    /// Restrict to one trace.
    #[must_use]
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Restrict to one category.
    #[must_use]
    pub const fn category(mut self, category: EventCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Restrict to one subject type.
    #[must_use]
    pub fn subject_type(mut self, subject_type: impl Into<String>) -> Self {
        self.subject_type = Some(subject_type.into());
        self
    }

    /// Restrict to one subject id.
    #[must_use]
    pub fn subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Restrict to one subject.
    #[must_use]
    pub fn subject(self, subject_type: impl Into<String>, subject_id: impl Into<String>) -> Self {
        self.subject_type(subject_type).subject_id(subject_id)
    }

    /// Replace the limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether `envelope` passes every filter that is set.
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        self.trace_id
            .as_deref()
            .is_none_or(|t| envelope.trace_id == t)
            && self.category.is_none_or(|c| envelope.event_category == c)
            && self
                .subject_type
                .as_deref()
                .is_none_or(|t| envelope.subject.subject_type == t)
            && self
                .subject_id
                .as_deref()
                .is_none_or(|i| envelope.subject.id == i)
    }
}
