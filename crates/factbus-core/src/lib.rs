//! Orchestration for the factbus event log.
//!
//! [`EventBus`] wires the store, contract validator, arbitration engine,
//! fact derivation reactor, projection engine and subscriber registry into
//! one synchronous publish pipeline. Everything downstream of an accepted
//! envelope (decisions, derived facts, projections) is computed from the
//! log rather than stored alongside it.
//!
//! # Modules
//!
//! - [`bus`] -- The publish pipeline, reads and subscriptions.
//! - [`config`] -- YAML configuration with environment overrides.
//! - [`error`] -- The outward [`BusError`] taxonomy and [`ErrorBody`].
//! - [`gateway`] -- Cold-start intents turned into a trace's first FACT.
//! - [`replay`] -- Replay verification of projection determinism.
//! - [`subscribers`] -- The ephemeral subscriber registry.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use factbus_core::{BusConfig, EventBus};
//! use factbus_store::InMemoryEventStore;
//! use factbus_types::{EnvelopeBuilder, EventCategory, ProducerType};
//! use serde_json::json;
//!
//! let bus = EventBus::from_config(Arc::new(InMemoryEventStore::new()), &BusConfig::default());
//! let fact = EnvelopeBuilder::new(EventCategory::Fact, "OrderPlaced")
//!     .producer(ProducerType::Sensor, "orders", "v1")
//!     .subject("order", "ORD-1")
//!     .payload(json!({ "facts": { "amount": 100 }, "observed_from": "api" }))
//!     .build();
//!
//! let stored = bus.publish(fact).ok();
//! assert_eq!(stored.and_then(|e| e.sequence_number), Some(1));
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod gateway;
pub mod replay;
pub mod subscribers;

pub use bus::{BusSettings, EventBus};
pub use config::{BusConfig, ConfigError};
pub use error::{BusError, ErrorBody, ErrorCode};
pub use gateway::{IntentReceipt, IntentRequest};
pub use replay::{ReplayMismatch, ReplayReport, verify_replay};
pub use subscribers::{SubscriberError, SubscriptionFilter};
