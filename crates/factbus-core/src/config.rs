//! Configuration loading and typed config structures for the event bus.
//!
//! The configuration lives in a YAML document (`factbus-config.yaml` by
//! convention). Every field has a default, so an empty document is a valid
//! configuration. Two environment variables are applied after parsing:
//!
//! - `FACTBUS_CRITICAL_COST_THRESHOLD` overrides
//!   `arbitration.critical_cost_threshold`
//! - `FACTBUS_LOG_LEVEL` overrides `logging.level`

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use factbus_arbitration::{
    ArbitrationEngine, ArbitrationPolicy, DecisionProducer, FactFreshnessPolicy,
    RiskCostLimitPolicy,
};

/// Environment variable overriding the critical cost threshold.
pub const ENV_COST_THRESHOLD: &str = "FACTBUS_CRITICAL_COST_THRESHOLD";

/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "FACTBUS_LOG_LEVEL";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {variable}: {value:?} ({reason})")]
    Override {
        /// The offending variable name.
        variable: &'static str,
        /// The raw value found.
        value: String,
        /// Why it was refused.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level bus configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Policy chain and decision identity.
    #[serde(default)]
    pub arbitration: ArbitrationConfig,

    /// Fact derivation reactor settings.
    #[serde(default)]
    pub derivation: DerivationConfig,

    /// Projection scan bounds.
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Query limits.
    #[serde(default)]
    pub query: QueryConfig,

    /// Intent gateway identity.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BusConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Override`] if an environment override is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Override`] if an environment override is malformed.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] if the threshold is not a decimal.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup(ENV_COST_THRESHOLD) {
            self.arbitration.critical_cost_threshold =
                Decimal::from_str(raw.trim()).map_err(|e| ConfigError::Override {
                    variable: ENV_COST_THRESHOLD,
                    reason: e.to_string(),
                    value: raw,
                })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Arbitration
// ---------------------------------------------------------------------------

/// A built-in arbitration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// [`FactFreshnessPolicy`].
    FactFreshness,
    /// [`RiskCostLimitPolicy`].
    RiskCostLimit,
}

/// Arbitration configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArbitrationConfig {
    /// Policy chain, evaluated in order.
    #[serde(default = "default_policies")]
    pub policies: Vec<PolicyKind>,

    /// Cost above which a critical-risk proposal is rejected.
    #[serde(default = "default_critical_cost_threshold")]
    pub critical_cost_threshold: Decimal,

    /// `producer.id` of generated decisions.
    #[serde(default = "default_arbitrator_id")]
    pub arbitrator_id: String,

    /// `producer.version` of generated decisions.
    #[serde(default = "default_arbitrator_version")]
    pub arbitrator_version: String,

    /// Maximum FACT envelopes handed to the policy chain.
    #[serde(default = "default_fact_query_limit")]
    pub fact_query_limit: usize,
}

impl ArbitrationConfig {
    /// Instantiate the configured policy chain.
    pub fn build_policies(&self) -> Vec<Box<dyn ArbitrationPolicy>> {
        self.policies
            .iter()
            .map(|kind| -> Box<dyn ArbitrationPolicy> {
                match kind {
                    PolicyKind::FactFreshness => Box::new(FactFreshnessPolicy),
                    PolicyKind::RiskCostLimit => {
                        Box::new(RiskCostLimitPolicy::new(self.critical_cost_threshold))
                    }
                }
            })
            .collect()
    }

    /// Build an [`ArbitrationEngine`] from this section.
    pub fn build_engine(&self) -> ArbitrationEngine {
        ArbitrationEngine::new(
            self.build_policies(),
            DecisionProducer {
                id: self.arbitrator_id.clone(),
                version: self.arbitrator_version.clone(),
            },
        )
    }
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            policies: default_policies(),
            critical_cost_threshold: default_critical_cost_threshold(),
            arbitrator_id: default_arbitrator_id(),
            arbitrator_version: default_arbitrator_version(),
            fact_query_limit: default_fact_query_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remaining sections
// ---------------------------------------------------------------------------

/// Fact derivation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DerivationConfig {
    /// `producer.id` of derived facts.
    #[serde(default = "default_reactor_id")]
    pub reactor_id: String,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            reactor_id: default_reactor_id(),
        }
    }
}

/// Projection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectionConfig {
    /// Envelopes scanned per projection.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            scan_limit: default_scan_limit(),
        }
    }
}

/// Query limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Limit used when a caller gives none.
    #[serde(default = "default_query_limit")]
    pub default_limit: usize,

    /// Upper bound applied to every caller-supplied limit.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_query_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Intent gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    /// `producer.id` of intent facts.
    #[serde(default = "default_gateway_id")]
    pub producer_id: String,

    /// `producer.version` of intent facts.
    #[serde(default = "default_gateway_version")]
    pub producer_version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            producer_id: default_gateway_id(),
            producer_version: default_gateway_version(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_policies() -> Vec<PolicyKind> {
    vec![PolicyKind::FactFreshness, PolicyKind::RiskCostLimit]
}

fn default_critical_cost_threshold() -> Decimal {
    Decimal::from(10_000)
}

fn default_arbitrator_id() -> String {
    DecisionProducer::default().id
}

fn default_arbitrator_version() -> String {
    DecisionProducer::default().version
}

const fn default_fact_query_limit() -> usize {
    1000
}

fn default_reactor_id() -> String {
    factbus_derivation::DEFAULT_REACTOR_ID.to_owned()
}

const fn default_scan_limit() -> usize {
    factbus_projection::DEFAULT_SCAN_LIMIT
}

const fn default_query_limit() -> usize {
    100
}

const fn default_max_limit() -> usize {
    1000
}

fn default_gateway_id() -> String {
    "gateway".to_owned()
}

fn default_gateway_version() -> String {
    "v1".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
