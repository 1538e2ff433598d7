// crates/bloxgate-upstream/src/service.rs
// ============================================================================
// Module: Upstream Services
// Description: Logical upstream service identifiers.
// Purpose: Key circuit breakers and metric labels per backend API family.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The four API families share one host, one credential, and one connection
//! pool, but fail independently. Each carries its own circuit breaker and
//! its own metric labels, keyed by the stable labels defined here.

use serde::Deserialize;
use serde::Serialize;

/// Logical upstream service behind the gateway.
///
/// # Invariants
/// - Labels are stable for metric and breaker keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// BloxOne DDI (IPAM, DNS, DHCP, federation).
    InfobloxApi,
    /// NIOSXaaS universal infrastructure (VPN provisioning).
    NiosxaasApi,
    /// Threat Defense security policy API.
    AtcfwApi,
    /// Security Insights API.
    InsightsApi,
}

impl ServiceKind {
    /// Returns the stable label for this service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InfobloxApi => "infoblox_api",
            Self::NiosxaasApi => "niosxaas_api",
            Self::AtcfwApi => "atcfw_api",
            Self::InsightsApi => "insights_api",
        }
    }

    /// Returns the API path prefix for this service.
    #[must_use]
    pub const fn path_prefix(self) -> &'static str {
        match self {
            Self::InfobloxApi => "/api/ddi/v1",
            Self::NiosxaasApi => "/api/universalinfra/v1",
            Self::AtcfwApi => "/api/atcfw/v1",
            Self::InsightsApi => "/api/insights/v1",
        }
    }

    /// Returns every service, in breaker registration order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::InfobloxApi, Self::NiosxaasApi, Self::AtcfwApi, Self::InsightsApi]
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
