// crates/bloxgate-config/src/lib.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Environment-driven configuration for the bloxgate gateway.
// Purpose: Provide strict, fail-closed config loading for all components.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Configuration is read once at startup from environment variables and
//! validated before any component is constructed. Missing credentials and
//! out-of-range values fail closed: the process refuses to start rather than
//! running with a partially applied configuration.

#![forbid(unsafe_code)]

mod config;

pub use config::AdminConfig;
pub use config::CacheConfig;
pub use config::ConfigError;
pub use config::EnvSource;
pub use config::GatewayConfig;
pub use config::LogFormat;
pub use config::ProcessEnv;
pub use config::ResilienceConfig;
pub use config::ServerConfig;
pub use config::SessionConfig;
pub use config::TelemetryConfig;
pub use config::UpstreamConfig;
