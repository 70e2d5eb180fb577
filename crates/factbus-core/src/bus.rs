//! The publish pipeline.
//!
//! One external publish runs to completion on the calling thread:
//!
//! 1. Idempotency: an already-known `event_id` is a [`BusError::DuplicateEvent`].
//! 2. Contract validation.
//! 3. Append, then fan-out to subscribers.
//! 4. Cascade: a PROPOSAL is arbitrated and its DECISION published; an
//!    EXECUTION is run through fact derivation and any FACT published.
//!
//! Cascaded envelopes go through the same steps. Only PROPOSAL and
//! EXECUTION produce follow-ups and neither follow-up (DECISION, FACT)
//! does, so one external publish appends at most two envelopes.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{info, warn};

use factbus_arbitration::ArbitrationEngine;
use factbus_contract::ContractValidator;
use factbus_derivation::FactDerivationReactor;
use factbus_projection::ProjectionEngine;
use factbus_store::{EventQuery, EventStore};
use factbus_types::{EventCategory, EventEnvelope, SubjectProjection, SubscriptionId};

use crate::config::{BusConfig, GatewayConfig, QueryConfig};
use crate::error::BusError;
use crate::gateway::{IntentReceipt, IntentRequest, intent_fact};
use crate::replay::{ReplayReport, verify_replay};
use crate::subscribers::{SubscriberError, SubscriberRegistry, SubscriptionFilter};

/// Cascade hops allowed after the externally published envelope.
const MAX_CASCADE_DEPTH: u8 = 1;

/// Limits and identities the bus applies on its own behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSettings {
    /// FACT envelopes fetched per arbitration.
    pub fact_query_limit: usize,
    /// Query limits.
    pub query: QueryConfig,
    /// Identity of intent facts.
    pub gateway: GatewayConfig,
}

impl BusSettings {
    /// Take the bus-level settings out of a [`BusConfig`].
    pub fn from_config(config: &BusConfig) -> Self {
        Self {
            fact_query_limit: config.arbitration.fact_query_limit,
            query: config.query.clone(),
            gateway: config.gateway.clone(),
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self::from_config(&BusConfig::default())
    }
}

/// The orchestrator wiring store, validator, arbitration, derivation,
/// projection and subscribers into one publish pipeline.
pub struct EventBus {
    store: Arc<dyn EventStore>,
    validator: ContractValidator,
    arbitration: ArbitrationEngine,
    reactor: FactDerivationReactor,
    projections: ProjectionEngine,
    subscribers: SubscriberRegistry,
    settings: BusSettings,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("arbitration", &self.arbitration)
            .field("reactor", &self.reactor)
            .field("projections", &self.projections)
            .field("subscribers", &self.subscribers)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Assemble a bus from explicitly constructed parts.
    pub fn new(
        store: Arc<dyn EventStore>,
        validator: ContractValidator,
        arbitration: ArbitrationEngine,
        reactor: FactDerivationReactor,
        projections: ProjectionEngine,
        settings: BusSettings,
    ) -> Self {
        Self {
            store,
            validator,
            arbitration,
            reactor,
            projections,
            subscribers: SubscriberRegistry::new(),
            settings,
        }
    }

    /// Assemble a bus over `store` with every part built from `config`.
    pub fn from_config(store: Arc<dyn EventStore>, config: &BusConfig) -> Self {
        let projections = ProjectionEngine::new(Arc::clone(&store), config.projection.scan_limit);
        Self::new(
            store,
            ContractValidator::new(),
            config.arbitration.build_engine(),
            FactDerivationReactor::new(
                factbus_derivation::default_rules(),
                config.derivation.reactor_id.clone(),
            ),
            projections,
            BusSettings::from_config(config),
        )
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Publish
    // -----------------------------------------------------------------------

    /// Publish `envelope` and run its cascade to completion.
    ///
    /// Returns the stored form of `envelope` (with its sequence number).
    ///
    /// # Errors
    ///
    /// - [`BusError::DuplicateEvent`] if the id is already in the log.
    /// - [`BusError::ContractViolation`] if the envelope, or a cascaded
    ///   one, breaks the contract.
    /// - [`BusError::Internal`] if the store fails.
    ///
    /// Rejection of the external envelope leaves the log untouched. A
    /// failure while cascading is returned after the trigger was stored.
    pub fn publish(&self, envelope: EventEnvelope) -> Result<EventEnvelope, BusError> {
        let mut pending = VecDeque::from([(envelope, 0_u8)]);
        let mut published = None;

        while let Some((next, depth)) = pending.pop_front() {
            let stored = self.admit(next)?;
            if let Some(follow_up) = self.cascade(&stored)? {
                if depth < MAX_CASCADE_DEPTH {
                    pending.push_back((follow_up, depth.saturating_add(1)));
                } else {
                    warn!(
                        event_id = %follow_up.event_id,
                        trigger = %stored.event_id,
                        "cascade depth exceeded, follow-up dropped"
                    );
                }
            }
            published.get_or_insert(stored);
        }

        published.ok_or_else(|| BusError::Internal("publish produced no envelope".to_owned()))
    }

    /// Steps 1-3 for a single envelope.
    fn admit(&self, mut envelope: EventEnvelope) -> Result<EventEnvelope, BusError> {
        if self.store.exists_by_event_id(&envelope.event_id)? {
            warn!(event_id = %envelope.event_id, "duplicate event rejected");
            return Err(BusError::DuplicateEvent {
                event_id: envelope.event_id,
            });
        }

        if let Err(err) = self.validator.validate(&envelope, self.store.as_ref()) {
            warn!(
                event_id = %envelope.event_id,
                category = %envelope.event_category,
                error = %err,
                "contract violation"
            );
            return Err(err.into());
        }

        envelope.sequence_number = None;
        let stored = self.store.append(envelope)?;
        info!(
            event_id = %stored.event_id,
            sequence_number = stored.sequence_number,
            category = %stored.event_category,
            event_name = %stored.event_name,
            subject = %stored.subject,
            "event appended"
        );

        self.subscribers.notify(&stored);
        Ok(stored)
    }

    /// Step 4: the follow-up envelope `stored` triggers, if any.
    fn cascade(&self, stored: &EventEnvelope) -> Result<Option<EventEnvelope>, BusError> {
        match stored.event_category {
            EventCategory::Proposal => {
                let facts = self.store.query(
                    &EventQuery::new(self.settings.fact_query_limit)
                        .category(EventCategory::Fact)
                        .subject(
                            stored.subject.subject_type.clone(),
                            stored.subject.id.clone(),
                        ),
                )?;
                Ok(Some(self.arbitration.arbitrate(stored, &facts)?))
            }
            EventCategory::Execution => Ok(self.reactor.try_derive(stored)),
            EventCategory::Fact
            | EventCategory::Decision
            | EventCategory::Observation
            | EventCategory::ToolCall
            | EventCategory::ToolResult
            | EventCategory::AgentDiagnostic => Ok(None),
        }
    }

    /// Publish the FACT for an external intent.
    ///
    /// # Errors
    ///
    /// [`BusError::ContractViolation`] for a malformed request, otherwise
    /// as [`publish`](Self::publish).
    pub fn submit_intent(&self, request: IntentRequest) -> Result<IntentReceipt, BusError> {
        let fact = intent_fact(request, &self.settings.gateway)?;
        let stored = self.publish(fact)?;
        info!(event_id = %stored.event_id, trace_id = %stored.trace_id, "intent accepted");
        Ok(IntentReceipt::accepted(&stored))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// A query with the configured default limit.
    pub fn default_query(&self) -> EventQuery {
        EventQuery::new(self.settings.query.default_limit)
    }

    /// Envelopes matching `query`, its limit clamped to the configured
    /// maximum.
    ///
    /// # Errors
    ///
    /// [`BusError::Internal`] if the store fails.
    pub fn query(&self, query: EventQuery) -> Result<Vec<EventEnvelope>, BusError> {
        let limit = query.limit.min(self.settings.query.max_limit);
        Ok(self.store.query(&query.with_limit(limit))?)
    }

    /// Highest assigned sequence number, `0` when empty.
    ///
    /// # Errors
    ///
    /// [`BusError::Internal`] if the store fails.
    pub fn latest_sequence(&self) -> Result<u64, BusError> {
        Ok(self.store.latest_sequence()?)
    }

    /// Projection of one subject; `Ok(None)` when nothing concerns it.
    ///
    /// # Errors
    ///
    /// [`BusError::Internal`] if the store fails.
    pub fn get_projection(
        &self,
        subject_type: &str,
        subject_id: &str,
    ) -> Result<Option<SubjectProjection>, BusError> {
        Ok(self.projections.get_projection(subject_type, subject_id)?)
    }

    /// Replay the whole log into a fresh store and compare projections,
    /// scanning as far as the bus's projection engine does.
    ///
    /// # Errors
    ///
    /// [`BusError::Internal`] if a store fails.
    pub fn verify_replay(&self) -> Result<ReplayReport, BusError> {
        verify_replay(&self.store, self.projections.scan_limit())
    }

    /// The projection engine the bus reads through.
    pub const fn projections(&self) -> &ProjectionEngine {
        &self.projections
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Receive every envelope appended from now on.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribers.subscribe(SubscriptionFilter::default(), callback)
    }

    /// Receive appended envelopes passing `filter`.
    pub fn subscribe_filtered<F>(&self, filter: SubscriptionFilter, callback: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribers.subscribe(filter, callback)
    }

    /// Stop a subscription. Once this returns the callback is not invoked
    /// again. Returns `false` if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
