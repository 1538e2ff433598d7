// crates/bloxgate-config/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Configuration loading and validation for bloxgate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every tunable of the gateway is an environment variable with a documented
//! default. Loading goes through [`EnvSource`] so tests can substitute a map
//! for the process environment. Validation rejects out-of-range values
//! instead of clamping them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable for the upstream base URL.
pub const ENV_BASE_URL: &str = "INFOBLOX_BASE_URL";
/// Environment variable for the upstream API credential.
pub const ENV_API_KEY: &str = "INFOBLOX_API_KEY";
/// Environment variable for the RPC listener bind address.
pub const ENV_RPC_BIND: &str = "BLOXGATE_RPC_BIND";
/// Environment variable for the admin listener bind address.
pub const ENV_ADMIN_BIND: &str = "BLOXGATE_ADMIN_BIND";
/// Environment variable for the global cache toggle.
pub const ENV_CACHE_ENABLED: &str = "BLOXGATE_CACHE_ENABLED";
/// Environment variable for the default cache TTL in seconds.
pub const ENV_CACHE_TTL_SECS: &str = "BLOXGATE_CACHE_TTL_SECS";
/// Environment variable for the per-tool cache capacity.
pub const ENV_CACHE_MAX_ENTRIES: &str = "BLOXGATE_CACHE_MAX_ENTRIES";
/// Environment variable for the per-attempt upstream deadline in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "BLOXGATE_REQUEST_TIMEOUT_SECS";
/// Environment variable for the breaker failure threshold.
pub const ENV_BREAKER_THRESHOLD: &str = "BLOXGATE_BREAKER_THRESHOLD";
/// Environment variable for the breaker reset timeout in seconds.
pub const ENV_BREAKER_RESET_SECS: &str = "BLOXGATE_BREAKER_RESET_SECS";
/// Environment variable for the retry attempt budget.
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "BLOXGATE_RETRY_MAX_ATTEMPTS";
/// Environment variable for the trace collector endpoint.
pub const ENV_TRACE_ENDPOINT: &str = "BLOXGATE_TRACE_ENDPOINT";
/// Environment variable for the log output format.
pub const ENV_LOG_FORMAT: &str = "BLOXGATE_LOG_FORMAT";
/// Environment variable for the session idle timeout in seconds.
pub const ENV_SESSION_IDLE_SECS: &str = "BLOXGATE_SESSION_IDLE_SECS";
/// Environment variable for the shutdown grace period in seconds.
pub const ENV_SHUTDOWN_GRACE_SECS: &str = "BLOXGATE_SHUTDOWN_GRACE_SECS";

/// Default upstream base URL.
pub const DEFAULT_BASE_URL: &str = "https://csp.infoblox.com";
/// Default RPC listener bind address.
pub const DEFAULT_RPC_BIND: &str = "0.0.0.0:8000";
/// Default admin listener bind address.
pub const DEFAULT_ADMIN_BIND: &str = "0.0.0.0:8001";
/// Default cache TTL in seconds when a tool declares TTL without a value.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
/// Default per-tool cache capacity.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1_000;
/// Default per-attempt upstream deadline in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default consecutive failures before a breaker opens.
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
/// Default breaker reset timeout in seconds.
pub const DEFAULT_BREAKER_RESET_SECS: u64 = 60;
/// Default retry attempt budget for retryable upstream failures.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 12;
/// Default session idle timeout in seconds.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 300;
/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
/// Default outbound frame queue depth per session.
pub const DEFAULT_SESSION_QUEUE_DEPTH: usize = 64;
/// Default cache hit-rate floor below which health reports degraded.
pub const DEFAULT_CACHE_HIT_RATE_FLOOR: f64 = 0.0;

/// Maximum accepted cache TTL in seconds (one day).
const MAX_CACHE_TTL_SECS: u64 = 86_400;
/// Maximum accepted per-tool cache capacity.
const MAX_CACHE_ENTRIES: usize = 100_000;
/// Maximum accepted request timeout in seconds.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Maximum accepted breaker failure threshold.
const MAX_BREAKER_THRESHOLD: u32 = 1_000;
/// Maximum accepted breaker reset timeout in seconds.
const MAX_BREAKER_RESET_SECS: u64 = 3_600;
/// Maximum accepted retry attempt budget.
const MAX_RETRY_ATTEMPTS: u32 = 64;
/// Maximum accepted credential length in bytes.
const MAX_API_KEY_LENGTH: usize = 512;

// ============================================================================
// SECTION: Environment Source
// ============================================================================

/// Source of environment variables for configuration loading.
pub trait EnvSource {
    /// Returns the value of `key` when set and valid unicode.
    fn var(&self, key: &str) -> Option<String>;
}

/// Environment source backed by the process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

// ============================================================================
// SECTION: Configuration Sections
// ============================================================================

/// Upstream REST backend configuration.
///
/// # Invariants
/// - `api_key` is non-empty.
/// - `base_url` carries no trailing slash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL requests are issued against.
    pub base_url: String,
    /// Bearer credential sent as `Authorization: Token <key>`.
    pub api_key: String,
}

/// Listener configuration for the RPC transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the `/mcp` and `/sse` listener.
    pub rpc_bind: SocketAddr,
}

/// Listener configuration for the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bind address for the metrics/health listener.
    pub admin_bind: SocketAddr,
}

/// Response cache configuration.
///
/// # Invariants
/// - `default_ttl` and `max_entries_per_tool` are within validated bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Global toggle; false degrades every tool policy to no caching.
    pub enabled: bool,
    /// TTL used when a tool declares caching without an explicit value.
    pub default_ttl: Duration,
    /// Maximum cached entries per tool before LRU eviction.
    pub max_entries_per_tool: usize,
}

/// Timeout, breaker, and retry configuration for the call pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Deadline applied to each upstream attempt.
    pub request_timeout: Duration,
    /// Consecutive counted failures before a breaker opens.
    pub breaker_failure_threshold: u32,
    /// Time an open breaker waits before admitting a probe.
    pub breaker_reset_timeout: Duration,
    /// Maximum attempts for retryable upstream failures.
    pub retry_max_attempts: u32,
}

/// Tracing and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Span collector endpoint; `None` disables export.
    pub trace_endpoint: Option<String>,
    /// Structured log output format.
    pub log_format: LogFormat,
    /// Cache hit-rate floor below which health degrades.
    pub cache_hit_rate_floor: f64,
}

/// Session lifecycle configuration for the RPC transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is closed.
    pub idle_timeout: Duration,
    /// Bounded outbound frame queue depth per session.
    pub outbound_queue_depth: usize,
    /// Grace period for in-flight calls during shutdown.
    pub shutdown_grace: Duration,
}

/// Structured log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Newline-delimited JSON records.
    Json,
    /// Human-readable console output.
    Console,
}

// ============================================================================
// SECTION: Gateway Configuration
// ============================================================================

/// Complete gateway configuration assembled from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Upstream backend settings.
    pub upstream: UpstreamConfig,
    /// RPC listener settings.
    pub server: ServerConfig,
    /// Admin listener settings.
    pub admin: AdminConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// Pipeline resilience settings.
    pub resilience: ResilienceConfig,
    /// Tracing and logging settings.
    pub telemetry: TelemetryConfig,
    /// Session lifecycle settings.
    pub session: SessionConfig,
}

impl GatewayConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when required variables are missing or any
    /// value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// Loads configuration from an arbitrary environment source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when required variables are missing or any
    /// value fails validation.
    pub fn from_source(source: &impl EnvSource) -> Result<Self, ConfigError> {
        let api_key = source
            .var(ENV_API_KEY)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingCredential)?;
        if api_key.len() > MAX_API_KEY_LENGTH {
            return Err(ConfigError::InvalidValue {
                variable: ENV_API_KEY,
                reason: "credential exceeds maximum length".to_string(),
            });
        }
        let base_url = source
            .var(ENV_BASE_URL)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(ConfigError::InvalidValue {
                variable: ENV_BASE_URL,
                reason: "base url must be http(s)".to_string(),
            });
        }

        let config = Self {
            upstream: UpstreamConfig {
                base_url,
                api_key,
            },
            server: ServerConfig {
                rpc_bind: parse_bind(source, ENV_RPC_BIND, DEFAULT_RPC_BIND)?,
            },
            admin: AdminConfig {
                admin_bind: parse_bind(source, ENV_ADMIN_BIND, DEFAULT_ADMIN_BIND)?,
            },
            cache: CacheConfig {
                enabled: parse_bool(source, ENV_CACHE_ENABLED, true)?,
                default_ttl: Duration::from_secs(parse_u64(
                    source,
                    ENV_CACHE_TTL_SECS,
                    DEFAULT_CACHE_TTL_SECS,
                )?),
                max_entries_per_tool: parse_usize(
                    source,
                    ENV_CACHE_MAX_ENTRIES,
                    DEFAULT_CACHE_MAX_ENTRIES,
                )?,
            },
            resilience: ResilienceConfig {
                request_timeout: Duration::from_secs(parse_u64(
                    source,
                    ENV_REQUEST_TIMEOUT_SECS,
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?),
                breaker_failure_threshold: parse_u32(
                    source,
                    ENV_BREAKER_THRESHOLD,
                    DEFAULT_BREAKER_THRESHOLD,
                )?,
                breaker_reset_timeout: Duration::from_secs(parse_u64(
                    source,
                    ENV_BREAKER_RESET_SECS,
                    DEFAULT_BREAKER_RESET_SECS,
                )?),
                retry_max_attempts: parse_u32(
                    source,
                    ENV_RETRY_MAX_ATTEMPTS,
                    DEFAULT_RETRY_MAX_ATTEMPTS,
                )?,
            },
            telemetry: TelemetryConfig {
                trace_endpoint: source.var(ENV_TRACE_ENDPOINT).filter(|value| !value.is_empty()),
                log_format: parse_log_format(source)?,
                cache_hit_rate_floor: DEFAULT_CACHE_HIT_RATE_FLOOR,
            },
            session: SessionConfig {
                idle_timeout: Duration::from_secs(parse_u64(
                    source,
                    ENV_SESSION_IDLE_SECS,
                    DEFAULT_SESSION_IDLE_SECS,
                )?),
                outbound_queue_depth: DEFAULT_SESSION_QUEUE_DEPTH,
                shutdown_grace: Duration::from_secs(parse_u64(
                    source,
                    ENV_SHUTDOWN_GRACE_SECS,
                    DEFAULT_SHUTDOWN_GRACE_SECS,
                )?),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints and value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            ENV_CACHE_TTL_SECS,
            self.cache.default_ttl.as_secs(),
            1,
            MAX_CACHE_TTL_SECS,
        )?;
        check_range(
            ENV_CACHE_MAX_ENTRIES,
            self.cache.max_entries_per_tool as u64,
            1,
            MAX_CACHE_ENTRIES as u64,
        )?;
        check_range(
            ENV_REQUEST_TIMEOUT_SECS,
            self.resilience.request_timeout.as_secs(),
            1,
            MAX_REQUEST_TIMEOUT_SECS,
        )?;
        check_range(
            ENV_BREAKER_THRESHOLD,
            u64::from(self.resilience.breaker_failure_threshold),
            1,
            u64::from(MAX_BREAKER_THRESHOLD),
        )?;
        check_range(
            ENV_BREAKER_RESET_SECS,
            self.resilience.breaker_reset_timeout.as_secs(),
            1,
            MAX_BREAKER_RESET_SECS,
        )?;
        check_range(
            ENV_RETRY_MAX_ATTEMPTS,
            u64::from(self.resilience.retry_max_attempts),
            1,
            u64::from(MAX_RETRY_ATTEMPTS),
        )?;
        if self.server.rpc_bind == self.admin.admin_bind {
            return Err(ConfigError::InvalidValue {
                variable: ENV_ADMIN_BIND,
                reason: "admin listener must not share the rpc bind address".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Parse Helpers
// ============================================================================

/// Parses a socket bind address with a default.
fn parse_bind(
    source: &impl EnvSource,
    variable: &'static str,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let raw = source.var(variable).unwrap_or_else(|| default.to_string());
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        variable,
        reason: format!("invalid socket address: {raw}"),
    })
}

/// Parses a boolean with a default; accepts `true`/`false`/`1`/`0`.
fn parse_bool(
    source: &impl EnvSource,
    variable: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match source.var(variable) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                variable,
                reason: format!("expected boolean, got: {raw}"),
            }),
        },
    }
}

/// Parses an unsigned integer with a default.
fn parse_u64(
    source: &impl EnvSource,
    variable: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match source.var(variable) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            variable,
            reason: format!("expected integer, got: {raw}"),
        }),
    }
}

/// Parses a `u32` with a default.
fn parse_u32(
    source: &impl EnvSource,
    variable: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match source.var(variable) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            variable,
            reason: format!("expected integer, got: {raw}"),
        }),
    }
}

/// Parses a `usize` with a default.
fn parse_usize(
    source: &impl EnvSource,
    variable: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match source.var(variable) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            variable,
            reason: format!("expected integer, got: {raw}"),
        }),
    }
}

/// Parses the log format with a console default.
fn parse_log_format(source: &impl EnvSource) -> Result<LogFormat, ConfigError> {
    match source.var(ENV_LOG_FORMAT) {
        None => Ok(LogFormat::Console),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "console" => Ok(LogFormat::Console),
            _ => Err(ConfigError::InvalidValue {
                variable: ENV_LOG_FORMAT,
                reason: format!("expected json or console, got: {raw}"),
            }),
        },
    }
}

/// Checks an inclusive numeric range.
fn check_range(
    variable: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::InvalidValue {
            variable,
            reason: format!("value {value} outside allowed range {min}..={max}"),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The upstream credential is missing or empty.
    #[error("missing upstream credential ({ENV_API_KEY})")]
    MissingCredential,
    /// A variable is present but fails parsing or range validation.
    #[error("invalid value for {variable}: {reason}")]
    InvalidValue {
        /// Environment variable name.
        variable: &'static str,
        /// Human-readable rejection reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::collections::HashMap;

    use super::*;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|value| (*value).to_string())
        }
    }

    fn minimal_env() -> MapEnv {
        MapEnv(HashMap::from([(ENV_API_KEY, "test-key")]))
    }

    #[test]
    fn defaults_applied_with_only_credential() {
        let config = GatewayConfig::from_source(&minimal_env()).unwrap();
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.cache.default_ttl.as_secs(), DEFAULT_CACHE_TTL_SECS);
        assert_eq!(config.cache.max_entries_per_tool, DEFAULT_CACHE_MAX_ENTRIES);
        assert_eq!(
            config.resilience.breaker_failure_threshold,
            DEFAULT_BREAKER_THRESHOLD
        );
        assert_eq!(config.resilience.retry_max_attempts, DEFAULT_RETRY_MAX_ATTEMPTS);
        assert!(config.cache.enabled);
        assert_eq!(config.telemetry.log_format, LogFormat::Console);
        assert!(config.telemetry.trace_endpoint.is_none());
    }

    #[test]
    fn missing_credential_fails_closed() {
        let env = MapEnv(HashMap::new());
        let err = GatewayConfig::from_source(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn blank_credential_fails_closed() {
        let env = MapEnv(HashMap::from([(ENV_API_KEY, "   ")]));
        let err = GatewayConfig::from_source(&env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let env = MapEnv(HashMap::from([
            (ENV_API_KEY, "test-key"),
            (ENV_BASE_URL, "https://csp.example.com/"),
        ]));
        let config = GatewayConfig::from_source(&env).unwrap();
        assert_eq!(config.upstream.base_url, "https://csp.example.com");
    }

    #[test]
    fn cache_toggle_accepts_numeric_forms() {
        let env = MapEnv(HashMap::from([
            (ENV_API_KEY, "test-key"),
            (ENV_CACHE_ENABLED, "0"),
        ]));
        let config = GatewayConfig::from_source(&env).unwrap();
        assert!(!config.cache.enabled);
    }

    #[test]
    fn out_of_range_ttl_rejected_not_clamped() {
        let env = MapEnv(HashMap::from([
            (ENV_API_KEY, "test-key"),
            (ENV_CACHE_TTL_SECS, "0"),
        ]));
        let err = GatewayConfig::from_source(&env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                variable: ENV_CACHE_TTL_SECS,
                ..
            }
        ));
    }

    #[test]
    fn invalid_log_format_rejected() {
        let env = MapEnv(HashMap::from([
            (ENV_API_KEY, "test-key"),
            (ENV_LOG_FORMAT, "xml"),
        ]));
        assert!(GatewayConfig::from_source(&env).is_err());
    }

    #[test]
    fn shared_bind_address_rejected() {
        let env = MapEnv(HashMap::from([
            (ENV_API_KEY, "test-key"),
            (ENV_RPC_BIND, "127.0.0.1:9000"),
            (ENV_ADMIN_BIND, "127.0.0.1:9000"),
        ]));
        assert!(GatewayConfig::from_source(&env).is_err());
    }

    #[test]
    fn empty_trace_endpoint_disables_export() {
        let env = MapEnv(HashMap::from([
            (ENV_API_KEY, "test-key"),
            (ENV_TRACE_ENDPOINT, ""),
        ]));
        let config = GatewayConfig::from_source(&env).unwrap();
        assert!(config.telemetry.trace_endpoint.is_none());
    }
}
