//! The contract validator.

use tracing::debug;

use factbus_store::EventStore;
use factbus_types::{EventEnvelope, is_uuid};

use crate::ContractError;
use crate::payload::{check_payload, is_blank};
use crate::permissions::{describe_allowed, is_permitted};

/// Gatekeeper applied to every envelope before append.
///
/// Stateless; the store is borrowed per call and consulted only for the
/// `based_on_events` existence check on proposals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractValidator;

impl ContractValidator {
    /// Create a validator.
    pub const fn new() -> Self {
        Self
    }

    /// Validate `envelope`, returning the first violation found.
    pub fn validate(
        &self,
        envelope: &EventEnvelope,
        store: &dyn EventStore,
    ) -> Result<(), ContractError> {
        let result = Self::check(envelope, store);
        if let Err(err) = &result {
            debug!(
                event_id = %envelope.event_id,
                category = %envelope.event_category,
                reason = %err,
                "envelope failed contract validation"
            );
        }
        result
    }

    /// Envelope fields, producer identity, permission, subject, payload;
    /// in that order.
    fn check(envelope: &EventEnvelope, store: &dyn EventStore) -> Result<(), ContractError> {
        Self::check_structure(envelope)?;

        require(&envelope.producer.id, "producer.id is required")?;
        require(&envelope.producer.version, "producer.version is required")?;
        let producer = envelope.producer.producer_type;
        let category = envelope.event_category;
        if !is_permitted(producer, category) {
            return Err(ContractError::Forbidden {
                producer,
                category,
                allowed: describe_allowed(producer),
            });
        }

        require(&envelope.subject.subject_type, "subject.type is required")?;
        require(&envelope.subject.id, "subject.id is required")?;

        let Some(payload) = envelope.payload_object() else {
            let message = if envelope.payload.is_null() {
                "payload is required"
            } else {
                "payload must be an object"
            };
            return Err(ContractError::violation(message));
        };

        check_payload(category, payload, store)
    }

    fn check_structure(envelope: &EventEnvelope) -> Result<(), ContractError> {
        require(&envelope.schema_version, "schema_version is required")?;
        if !is_semver(&envelope.schema_version) {
            return Err(ContractError::violation(
                "schema_version must be semver like 1.0.0",
            ));
        }
        if !is_uuid(&envelope.event_id) {
            return Err(ContractError::violation("event_id must be a valid UUID"));
        }
        require(&envelope.event_name, "event_name is required")?;
        require(&envelope.trace_id, "trace_id is required")?;

        if let Some(causation) = envelope.causation_id.as_deref() {
            if !is_blank(causation) && !is_uuid(causation) {
                return Err(ContractError::violation(
                    "causation_id must be a valid UUID when provided",
                ));
            }
        }
        Ok(())
    }
}

fn require(value: &str, message: &str) -> Result<(), ContractError> {
    if is_blank(value) {
        Err(ContractError::violation(message))
    } else {
        Ok(())
    }
}

/// `MAJOR.MINOR.PATCH`, each a non-empty run of ASCII digits.
fn is_semver(version: &str) -> bool {
    let mut parts = 0_u8;
    for part in version.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts = match parts.checked_add(1) {
            Some(n) if n <= 3 => n,
            _ => return false,
        };
    }
    parts == 3
}
