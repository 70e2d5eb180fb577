//! Enumeration types for the factbus event contract.
//!
//! [`EventCategory`] and [`ProducerType`] are typed fields of every
//! envelope. The remaining enums name the closed vocabularies that live
//! inside category payloads (`observed_from`, `risk_level`, `outcome`, ...);
//! payloads stay free-form JSON, so those enums are parsed on demand with
//! `from_wire`. Envelope deserialization goes through `from_wire` as well,
//! so the legacy `*_EVENT` category names and any producer-type casing are
//! read into the canonical variants.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Event category
// ---------------------------------------------------------------------------

/// The category of an envelope. Determines the payload schema and which
/// producers may emit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventCategory {
    /// Something observed to be true about a subject.
    Fact,
    /// An agent's proposed action, pending arbitration.
    Proposal,
    /// The arbitrator's verdict on one or more proposals.
    Decision,
    /// An executor's report of carrying out a decision.
    Execution,
    /// An agent's evidence-backed observation.
    Observation,
    /// An agent invoking a tool.
    ToolCall,
    /// The result of a tool invocation.
    ToolResult,
    /// Agent-internal diagnostic state.
    AgentDiagnostic,
}

impl EventCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Fact,
        Self::Proposal,
        Self::Decision,
        Self::Execution,
        Self::Observation,
        Self::ToolCall,
        Self::ToolResult,
        Self::AgentDiagnostic,
    ];

    /// Wire name of the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fact => "FACT",
            Self::Proposal => "PROPOSAL",
            Self::Decision => "DECISION",
            Self::Execution => "EXECUTION",
            Self::Observation => "OBSERVATION",
            Self::ToolCall => "TOOL_CALL",
            Self::ToolResult => "TOOL_RESULT",
            Self::AgentDiagnostic => "AGENT_DIAGNOSTIC",
        }
    }

    /// Parse a wire name. The legacy `*_EVENT` spellings are accepted too.
    pub fn from_wire(raw: &str) -> Option<Self> {
        let name = raw.trim().to_ascii_uppercase();
        let name = name.strip_suffix("_EVENT").unwrap_or(&name);
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl<'de> Deserialize<'de> for EventCategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown event category `{raw}`")))
    }
}

impl core::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Producer type
// ---------------------------------------------------------------------------

/// The kind of component that produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ProducerType {
    /// A physical or logical sensor.
    Sensor,
    /// An external API integration.
    Api,
    /// A point-in-time database snapshot.
    DatabaseSnapshot,
    /// A reasoning agent.
    Agent,
    /// The deterministic arbitrator.
    Arbitrator,
    /// A component that carries out decisions.
    Executor,
    /// Bus-internal infrastructure (gateway, reactors).
    System,
}

impl ProducerType {
    /// Every producer type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Sensor,
        Self::Api,
        Self::DatabaseSnapshot,
        Self::Agent,
        Self::Arbitrator,
        Self::Executor,
        Self::System,
    ];

    /// Wire name of the producer type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Api => "api",
            Self::DatabaseSnapshot => "database_snapshot",
            Self::Agent => "agent",
            Self::Arbitrator => "arbitrator",
            Self::Executor => "executor",
            Self::System => "system",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn from_wire(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl<'de> Deserialize<'de> for ProducerType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown producer type `{raw}`")))
    }
}

impl core::fmt::Display for ProducerType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payload vocabularies
// ---------------------------------------------------------------------------

/// Generates a closed string vocabulary with `as_str`/`from_wire`.
macro_rules! wire_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant ),+ ];

            /// Wire spelling of the value.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }

            /// Parse the exact wire spelling.
            pub fn from_wire(raw: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.as_str() == raw)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_vocabulary! {
    /// Where a FACT's information came from (`payload.observed_from`).
    ObservedFrom {
        /// Read from a database.
        Db => "db",
        /// Returned by an external API.
        Api => "api",
        /// Delivered by a webhook.
        Webhook => "webhook",
        /// Derived from an execution by the fact derivation reactor.
        ExecutorFeedback => "executor_feedback",
        /// Entered by a human.
        HumanInput => "human_input",
        /// Emitted by bus infrastructure.
        System => "system",
    }
}

wire_vocabulary! {
    /// Declared risk of a proposal (`payload.risk_level`).
    RiskLevel {
        /// Low risk.
        Low => "low",
        /// Medium risk.
        Medium => "medium",
        /// High risk.
        High => "high",
        /// Critical risk; subject to the cost limit policy.
        Critical => "critical",
    }
}

wire_vocabulary! {
    /// Verdict carried by a DECISION (`payload.outcome`).
    DecisionOutcome {
        /// Every policy passed.
        Approved => "approved",
        /// A policy rejected the proposal.
        Rejected => "rejected",
    }
}

wire_vocabulary! {
    /// Result reported by an EXECUTION (`payload.status`).
    ExecutionStatus {
        /// Completed successfully.
        Success => "success",
        /// Failed.
        Failed => "failed",
        /// Did not finish in time.
        Timeout => "timeout",
        /// Partially completed.
        Partial => "partial",
    }
}

wire_vocabulary! {
    /// Result reported by a `TOOL_RESULT` (`payload.status`).
    ToolResultStatus {
        /// The tool succeeded.
        Success => "success",
        /// The tool failed.
        Failed => "failed",
    }
}

wire_vocabulary! {
    /// Evidence tier a retried proposal must rely on.
    TrustTier {
        /// Highest trust: first-party systems of record.
        Tier1 => "tier_1",
        /// Intermediate trust.
        Tier2 => "tier_2",
        /// Lowest accepted trust.
        Tier3 => "tier_3",
    }
}
