//! Shared type definitions for the factbus event log.
//!
//! This crate is the single source of truth for the wire contract: the
//! event envelope, its closed vocabularies, and the read-side views folded
//! from the log. Types flow downstream to `TypeScript` via `ts-rs` for
//! transport and dashboard clients.
//!
//! # Modules
//!
//! - [`ids`] -- Envelope id helpers and the subscription handle
//! - [`enums`] -- Event categories, producer types, payload vocabularies
//! - [`envelope`] -- The [`EventEnvelope`] and its producer/subject parts
//! - [`builder`] -- [`EnvelopeBuilder`] for reactors and tests
//! - [`hint`] -- [`RetryHint`] carried by rejected decisions
//! - [`views`] -- Per-subject projection views

pub mod builder;
pub mod enums;
pub mod envelope;
pub mod hint;
pub mod ids;
pub mod views;

// Re-export all public types at crate root for convenience.
pub use builder::{DEFAULT_SCHEMA_VERSION, EnvelopeBuilder};
pub use enums::{
    DecisionOutcome, EventCategory, ExecutionStatus, ObservedFrom, ProducerType, RiskLevel,
    ToolResultStatus, TrustTier,
};
pub use envelope::{EventEnvelope, Producer, Subject};
pub use hint::RetryHint;
pub use ids::{SubscriptionId, is_uuid, new_event_id, short_token};
pub use views::{DecisionSnapshot, ExecutionSnapshot, FactSnapshot, SubjectProjection};
