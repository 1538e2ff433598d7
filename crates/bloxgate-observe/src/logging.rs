// crates/bloxgate-observe/src/logging.rs
// ============================================================================
// Module: Log Bootstrap
// Description: tracing-subscriber initialization for the gateway.
// Purpose: Emit structured key-value logs in json or console format.
// Dependencies: tracing-subscriber, bloxgate-config
// ============================================================================

//! ## Overview
//! Every log record carries `timestamp`, `level`, a snake_case `event`
//! token, and whatever context fields the call site attaches (tool name,
//! correlation id, attempt counters). The format is selected once at
//! startup; `RUST_LOG` still overrides the filter.

use bloxgate_config::LogFormat;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised during log bootstrap.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber is already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns [`LoggingError::AlreadyInitialized`] when a subscriber is already
/// set, which only happens when bootstrap runs twice.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Console => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    result.map_err(|_| LoggingError::AlreadyInitialized)
}
