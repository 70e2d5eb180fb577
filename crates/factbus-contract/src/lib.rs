//! Contract validation for the factbus event log.
//!
//! The [`ContractValidator`] is the gatekeeper every envelope passes before
//! it reaches the store. It runs three layers of checks, stopping at the
//! first violation:
//!
//! 1. **Structure** -- schema version, identifiers, names, producer and
//!    subject fields.
//! 2. **Permissions** -- the producer type may emit the envelope's category
//!    (see [`permissions`]).
//! 3. **Payload** -- the category-specific payload schema (see
//!    [`payload`]). PROPOSAL payloads additionally require every
//!    `based_on_events` id to exist in the store; that lookup is the only
//!    state the validator consults.
//!
//! Violations are never accumulated: the first one aborts validation with a
//! single [`ContractError`].

pub mod payload;
pub mod permissions;
pub mod validator;

pub use permissions::{allowed_categories, is_permitted};
pub use validator::ContractValidator;

use factbus_store::StoreError;
use factbus_types::{EventCategory, ProducerType};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why an envelope was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// A structural or payload rule was broken.
    #[error("{0}")]
    Violation(String),

    /// The producer type may not emit this category.
    #[error("{producer} producer is only allowed to publish {allowed}")]
    Forbidden {
        /// The producer type of the refused envelope.
        producer: ProducerType,
        /// The category it tried to emit.
        category: EventCategory,
        /// Human-readable list of permitted categories.
        allowed: String,
    },

    /// The causal-existence lookup could not be served.
    #[error("event store lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl ContractError {
    /// Build a [`ContractError::Violation`].
    pub fn violation(message: impl Into<String>) -> Self {
        Self::Violation(message.into())
    }

    /// Whether the envelope itself is at fault, as opposed to the store.
    pub const fn is_violation(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
