//! Producer type to event category permission matrix.

use factbus_types::{EventCategory, ProducerType};

/// Categories each producer type may emit. Anything absent is forbidden.
const PERMISSIONS: &[(ProducerType, &[EventCategory])] = &[
    (ProducerType::Sensor, &[EventCategory::Fact]),
    (ProducerType::Api, &[EventCategory::Fact]),
    (ProducerType::DatabaseSnapshot, &[EventCategory::Fact]),
    (
        ProducerType::Agent,
        &[
            EventCategory::Proposal,
            EventCategory::Observation,
            EventCategory::ToolCall,
            EventCategory::ToolResult,
            EventCategory::AgentDiagnostic,
        ],
    ),
    (ProducerType::Arbitrator, &[EventCategory::Decision]),
    (ProducerType::Executor, &[EventCategory::Execution]),
    (
        ProducerType::System,
        &[EventCategory::Fact, EventCategory::AgentDiagnostic],
    ),
];

/// The categories `producer` may emit, in declaration order.
pub fn allowed_categories(producer: ProducerType) -> &'static [EventCategory] {
    for (p, categories) in PERMISSIONS {
        if *p == producer {
            return *categories;
        }
    }
    &[]
}

/// Whether `producer` may emit `category`.
pub fn is_permitted(producer: ProducerType, category: EventCategory) -> bool {
    allowed_categories(producer).contains(&category)
}

/// Human-readable list of the categories `producer` may emit, e.g.
/// `FACT or AGENT_DIAGNOSTIC`.
pub fn describe_allowed(producer: ProducerType) -> String {
    let names: Vec<&str> = allowed_categories(producer)
        .iter()
        .map(|c| c.as_str())
        .collect();
    match names.split_last() {
        None => "nothing".to_owned(),
        Some((last, [])) => (*last).to_owned(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
    }
}
