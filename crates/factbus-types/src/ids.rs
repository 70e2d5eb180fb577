//! Identifier helpers.
//!
//! Envelope identifiers (`event_id`, `causation_id`) travel as plain strings
//! because producers assign them and the contract validator is the one that
//! decides whether they are well-formed UUIDs. Identifiers the bus itself
//! owns, such as subscription handles, get a typed wrapper.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Handle returned by `subscribe`, used to deregister a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// A fresh random handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Generate a fresh envelope identifier in canonical hyphenated form.
pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Return `true` if `value` parses as a UUID.
///
/// Accepts the forms [`Uuid::parse_str`] accepts; blank strings are never
/// valid.
pub fn is_uuid(value: &str) -> bool {
    !value.trim().is_empty() && Uuid::parse_str(value).is_ok()
}

/// Return the first eight hex characters of a fresh UUID.
///
/// Used for short, human-scannable identifiers such as `dec-1a2b3c4d`.
pub fn short_token() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_ids_are_distinct() {
        let a = SubscriptionId::new();
        let b = SubscriptionId::new();
        assert_ne!(a, b);
        assert!(is_uuid(&a.to_string()));
    }

    #[test]
    fn new_event_id_is_a_uuid() {
        assert!(is_uuid(&new_event_id()));
    }

    #[test]
    fn blank_and_garbage_are_not_uuids() {
        assert!(!is_uuid(""));
        assert!(!is_uuid("   "));
        assert!(!is_uuid("evt-1"));
        assert!(!is_uuid("1234"));
    }

    #[test]
    fn short_token_is_eight_hex_chars() {
        let token = short_token();
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
