//! The outward error taxonomy of the bus.
//!
//! Every rejection carries a machine-readable [`ErrorCode`] and a
//! human-readable message. A transport maps codes to its own status codes
//! and may serialize [`ErrorBody`] verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use factbus_arbitration::ArbitrationError;
use factbus_contract::ContractError;
use factbus_projection::ProjectionError;
use factbus_store::StoreError;

/// Machine-readable rejection kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum ErrorCode {
    /// Structural or schema-rule breach.
    ContractViolation,
    /// The `event_id` is already in the log.
    DuplicateEvent,
    /// Caller misuse.
    InvalidArgument,
    /// Unexpected failure.
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorCode {
    /// Wire form of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContractViolation => "CONTRACT_VIOLATION",
            Self::DuplicateEvent => "DUPLICATE_EVENT",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by [`EventBus`](crate::EventBus) operations.
///
/// No variant leaves the log partially applied by the envelope that
/// failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The envelope breaks the contract.
    #[error("{0}")]
    ContractViolation(String),

    /// An envelope with this id has already been published.
    #[error("Event already exists: {event_id}")]
    DuplicateEvent {
        /// The duplicated id.
        event_id: String,
    },

    /// The operation was called with an argument it cannot act on.
    #[error("{0}")]
    InvalidArgument(String),

    /// Something failed that the caller could not have prevented.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BusError {
    /// The machine-readable kind of this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ContractViolation(_) => ErrorCode::ContractViolation,
            Self::DuplicateEvent { .. } => ErrorCode::DuplicateEvent,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Build a rejection body stamped with the current time.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error_code: self.code(),
            message: self.to_string(),
            timestamp: Utc::now(),
        }
    }
}

impl From<StoreError> for BusError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEventId { event_id } => Self::DuplicateEvent { event_id },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ContractError> for BusError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Store(store) => Self::Internal(store.to_string()),
            other => Self::ContractViolation(other.to_string()),
        }
    }
}

impl From<ArbitrationError> for BusError {
    fn from(err: ArbitrationError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<ProjectionError> for BusError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::Store(store) => Self::Internal(store.to_string()),
        }
    }
}

/// Rejection body a transport may return verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorBody {
    /// Machine-readable kind.
    pub error_code: ErrorCode,
    /// Human-readable explanation.
    pub message: String,
    /// When the rejection was produced.
    pub timestamp: DateTime<Utc>,
}
