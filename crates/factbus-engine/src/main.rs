//! Engine binary for the factbus event log.
//!
//! This is the composition root: it loads configuration, wires the store,
//! contract validator, arbitration engine, fact derivation reactor,
//! projection engine and bus, then drives the bus from a file.
//!
//! # Run Sequence
//!
//! 1. Load configuration from `FACTBUS_CONFIG` (default
//!    `factbus-config.yaml` when present, else built-in defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Wire the bus
//! 4. Publish every envelope of `FACTBUS_INPUT` (one JSON envelope per
//!    line) in file order; rejections are logged and counted
//! 5. Print each subject's projection as one JSON line on stdout
//! 6. Verify replay determinism; exit non-zero on any mismatch

mod error;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use factbus_contract::ContractValidator;
use factbus_core::{BusConfig, BusError, BusSettings, ErrorCode, EventBus};
use factbus_derivation::{FactDerivationReactor, default_rules};
use factbus_projection::ProjectionEngine;
use factbus_store::{EventStore, InMemoryEventStore};
use factbus_types::EventEnvelope;

use crate::error::EngineError;

/// Config file looked up when `FACTBUS_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "factbus-config.yaml";

/// Outcome counts of one ingestion run.
#[derive(Debug, Default)]
struct IngestSummary {
    published: u64,
    duplicates: u64,
    violations: u64,
    malformed: u64,
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, input, or the store fails.
fn main() -> Result<ExitCode, EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        policies = ?config.arbitration.policies,
        critical_cost_threshold = %config.arbitration.critical_cost_threshold,
        scan_limit = config.projection.scan_limit,
        "factbus-engine starting"
    );

    // 3. Wire the bus.
    let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    let bus = EventBus::new(
        Arc::clone(&store),
        ContractValidator::new(),
        config.arbitration.build_engine(),
        FactDerivationReactor::new(default_rules(), config.derivation.reactor_id.clone()),
        ProjectionEngine::new(store, config.projection.scan_limit),
        BusSettings::from_config(&config),
    );

    // 4. Ingest.
    let Ok(path) = std::env::var("FACTBUS_INPUT") else {
        return Err(EngineError::MissingInput);
    };
    let input = std::fs::read_to_string(&path).map_err(|source| EngineError::Input {
        path: path.clone(),
        source,
    })?;
    let summary = ingest(&bus, &input)?;
    info!(
        published = summary.published,
        duplicates = summary.duplicates,
        violations = summary.violations,
        malformed = summary.malformed,
        latest_sequence = bus.latest_sequence()?,
        "ingestion complete"
    );

    // 5. Print projections.
    for subject in bus.projections().distinct_subjects().map_err(BusError::from)? {
        if let Some(projection) = bus.get_projection(&subject.subject_type, &subject.id)? {
            println!("{}", serde_json::to_string(&projection)?);
        }
    }

    // 6. Verify replay.
    let report = bus.verify_replay()?;
    if report.is_consistent() {
        info!(
            events_replayed = report.events_replayed,
            subjects_checked = report.subjects_checked,
            "replay verified"
        );
        Ok(ExitCode::SUCCESS)
    } else {
        for anomaly in &report.log_anomalies {
            warn!(%anomaly, "log anomaly");
        }
        for mismatch in &report.mismatches {
            warn!(%mismatch, "replay mismatch");
        }
        Ok(ExitCode::FAILURE)
    }
}

/// Load configuration from `FACTBUS_CONFIG` or the default path.
fn load_config() -> Result<BusConfig, EngineError> {
    if let Ok(path) = std::env::var("FACTBUS_CONFIG") {
        return Ok(BusConfig::from_file(Path::new(&path))?);
    }
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        Ok(BusConfig::from_file(default_path)?)
    } else {
        Ok(BusConfig::parse("")?)
    }
}

/// Publish each non-blank line of `input` in order.
///
/// Only failures that are not per-envelope rejections abort the run.
fn ingest(bus: &EventBus, input: &str) -> Result<IngestSummary, EngineError> {
    let mut summary = IngestSummary::default();

    for (index, line) in input.lines().enumerate() {
        let line_no = index.saturating_add(1);
        if line.trim().is_empty() {
            continue;
        }

        let envelope: EventEnvelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(line = line_no, error = %e, "malformed envelope skipped");
                summary.malformed = summary.malformed.saturating_add(1);
                continue;
            }
        };

        match bus.publish(envelope) {
            Ok(_) => summary.published = summary.published.saturating_add(1),
            Err(err) => match err.code() {
                ErrorCode::DuplicateEvent => {
                    summary.duplicates = summary.duplicates.saturating_add(1);
                }
                ErrorCode::ContractViolation | ErrorCode::InvalidArgument => {
                    warn!(line = line_no, error = %err, "envelope rejected");
                    summary.violations = summary.violations.saturating_add(1);
                }
                ErrorCode::Internal => return Err(err.into()),
            },
        }
    }

    Ok(summary)
}
