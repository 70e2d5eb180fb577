//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that aborts a run. Individual
//! envelopes that fail to parse or publish are counted, not raised.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: factbus_core::ConfigError,
    },

    /// The input file could not be read.
    #[error("failed to read input {path}: {source}")]
    Input {
        /// The path given in `FACTBUS_INPUT`.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// `FACTBUS_INPUT` was not set.
    #[error("FACTBUS_INPUT must name a newline-delimited JSON file of envelopes")]
    MissingInput,

    /// The bus failed in a way that is not a per-envelope rejection.
    #[error("bus error: {source}")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: factbus_core::BusError,
    },

    /// A projection could not be rendered as JSON.
    #[error("failed to render projection: {source}")]
    Render {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
