//! Property tests: sequence monotonicity under arbitrary publish mixes and
//! replay determinism of projections.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use factbus_core::{BusConfig, EventBus, verify_replay};
use factbus_store::{EventStore, InMemoryEventStore, LogIntegrity, verify_log};
use factbus_types::{EnvelopeBuilder, EventCategory, EventEnvelope, ProducerType};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One externally published step.
#[derive(Debug, Clone)]
enum Step {
    /// A sensor FACT about `ORD-{0}`.
    Fact(u8),
    /// A PROPOSAL grounded on the latest fact of `ORD-{0}`, with a cost.
    Proposal(u8, u32),
    /// An EXECUTION of the latest approved decision for `ORD-{0}`.
    Execution(u8, &'static str),
    /// Republish the first stored envelope (always a duplicate).
    Duplicate,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0_u8..3).prop_map(Step::Fact),
        (0_u8..3, 0_u32..20_000).prop_map(|(s, c)| Step::Proposal(s, c)),
        (0_u8..3, prop_oneof![
            Just("success"),
            Just("failed"),
            Just("partial"),
            Just("timeout")
        ])
        .prop_map(|(s, st)| Step::Execution(s, st)),
        Just(Step::Duplicate),
    ]
}

fn subject(n: u8) -> String {
    format!("ORD-{n}")
}

fn latest(bus: &EventBus, n: u8, category: EventCategory) -> Option<EventEnvelope> {
    bus.query(
        bus.default_query()
            .with_limit(1000)
            .category(category)
            .subject("order", subject(n)),
    )
    .unwrap()
    .pop()
}

/// Turn a step into an envelope, or `None` when its precondition is unmet.
fn envelope_for(bus: &EventBus, step: &Step) -> Option<EventEnvelope> {
    match *step {
        Step::Fact(n) => Some(
            EnvelopeBuilder::new(EventCategory::Fact, "Observed")
                .producer(ProducerType::Sensor, "s", "v1")
                .subject("order", subject(n))
                .payload(json!({ "facts": { "n": n }, "observed_from": "db" }))
                .build(),
        ),
        Step::Proposal(n, cost) => {
            let fact = latest(bus, n, EventCategory::Fact)?;
            Some(
                EnvelopeBuilder::new(EventCategory::Proposal, "Act")
                    .producer(ProducerType::Agent, "a", "v1")
                    .subject("order", subject(n))
                    .payload(json!({
                        "proposal_id": format!("p-{n}"),
                        "proposed_action": { "type": "act" },
                        "based_on_events": [fact.event_id],
                        "risk_level": "critical",
                        "cost_estimate": cost,
                        "priority": 1,
                        "max_fact_age_ms": 600_000
                    }))
                    .build(),
            )
        }
        Step::Execution(n, status) => {
            let decision = latest(bus, n, EventCategory::Decision)?;
            Some(
                EnvelopeBuilder::new(EventCategory::Execution, "Acted")
                    .producer(ProducerType::Executor, "x", "v1")
                    .subject("order", subject(n))
                    .payload(json!({
                        "decision_event_id": decision.event_id,
                        "execution_id": format!("exe-{}", decision.event_id),
                        "status": status,
                        "executor": "x"
                    }))
                    .build(),
            )
        }
        Step::Duplicate => bus.query(bus.default_query().with_limit(1)).unwrap().pop(),
    }
}

fn run(steps: &[Step]) -> EventBus {
    let bus = EventBus::from_config(Arc::new(InMemoryEventStore::new()), &BusConfig::default());
    for step in steps {
        if let Some(envelope) = envelope_for(&bus, step) {
            // Rejections are part of the property: they must not disturb
            // the log.
            let _ = bus.publish(envelope);
        }
    }
    bus
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Whatever mix of accepted, cascaded and rejected publishes happens,
    /// the log is gapless, starts at 1 and has unique ids.
    #[test]
    fn sequences_stay_gapless(steps in prop::collection::vec(arb_step(), 1..40)) {
        let bus = run(&steps);
        let latest = bus.latest_sequence().unwrap();
        let log = bus.store().query_by_sequence_range(1, latest, usize::MAX).unwrap();

        prop_assert_eq!(u64::try_from(log.len()).unwrap(), latest);
        prop_assert_eq!(verify_log(&log), LogIntegrity::Contiguous);
        if let Some(first) = log.first() {
            prop_assert_eq!(first.sequence_number, Some(1));
        }
    }

    /// Replaying the log into an empty store yields identical projections
    /// for every subject.
    #[test]
    fn replay_is_deterministic(steps in prop::collection::vec(arb_step(), 1..40)) {
        let bus = run(&steps);
        let report = verify_replay(bus.store(), 10_000).unwrap();

        prop_assert!(report.is_consistent(), "mismatches: {:?}", report.mismatches);
        prop_assert_eq!(u64::try_from(report.events_replayed).unwrap(), bus.latest_sequence().unwrap());
    }
}
