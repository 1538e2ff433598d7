// crates/bloxgate-registry/src/registry.rs
// ============================================================================
// Module: Registry Core
// Description: The immutable name → descriptor map and its dispatch path.
// Purpose: Validate at the boundary, resolve policy, invoke the handler.
// Dependencies: bloxgate-resilience, serde_json
// ============================================================================

//! ## Overview
//! Built once at startup from the catalog modules, then read-only: lookups
//! need no synchronization. `invoke` is the single dispatch path: schema
//! validation, cache policy resolution, fingerprinting, then the handler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use bloxgate_resilience::argument_fingerprint;
use serde::Serialize;
use serde_json::Value;

use crate::catalog;
use crate::context::CallScope;
use crate::context::ToolContext;
use crate::descriptor::ToolClass;
use crate::descriptor::ToolDescriptor;
use crate::error::RegistryError;
use crate::error::ToolError;
use crate::validate::validate_arguments;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Configuration the registry needs to resolve cache policies.
#[derive(Debug, Clone, Copy)]
pub struct RegistryDefaults {
    /// TTL used when a tool declares caching without an explicit value.
    pub default_cache_ttl: Duration,
}

/// One tool as published in `list_tools_result`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolListing {
    /// Tool name.
    pub name: &'static str,
    /// Human description.
    pub description: &'static str,
    /// Input schema in wire form.
    pub input_schema: Value,
    /// Whether the tool is mutation-free.
    pub read_only: bool,
}

/// The static tool registry.
pub struct ToolRegistry {
    /// Descriptors keyed by name.
    tools: BTreeMap<&'static str, ToolDescriptor>,
    /// Policy resolution defaults.
    defaults: RegistryDefaults,
}

impl ToolRegistry {
    /// Creates an empty registry; used by tests that register fixtures.
    #[must_use]
    pub fn empty(defaults: RegistryDefaults) -> Self {
        Self {
            tools: BTreeMap::new(),
            defaults,
        }
    }

    /// Builds the registry with the full shipped catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when two catalog entries collide.
    pub fn with_catalog(defaults: RegistryDefaults) -> Result<Self, RegistryError> {
        let mut registry = Self::empty(defaults);
        catalog::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Registers one descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] on a name collision.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name;
        if self.tools.insert(name, descriptor).is_some() {
            return Err(RegistryError::DuplicateTool {
                name,
            });
        }
        Ok(())
    }

    /// Returns the published catalog, ordered by name.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolListing> {
        self.tools
            .values()
            .map(|descriptor| ToolListing {
                name: descriptor.name,
                description: descriptor.description,
                input_schema: descriptor.schema.to_wire(),
                read_only: descriptor.class == ToolClass::Read,
            })
            .collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns whether a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Validates arguments and dispatches one tool call.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown tools, schema violations, and
    /// handler failures.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let descriptor = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        let validated = validate_arguments(&descriptor.schema, arguments)?;

        let cache_ttl = descriptor.effective_ttl(self.defaults.default_cache_ttl);
        let fingerprint = match cache_ttl {
            Some(_) => Some(argument_fingerprint(&validated).map_err(|err| {
                ToolError::SchemaViolation {
                    message: err.to_string(),
                }
            })?),
            None => None,
        };

        tracing::info!(
            event = "tool_invoked",
            tool = %name,
            correlation_id = %ctx.correlation_id,
        );
        let scope = CallScope {
            tool: descriptor.name,
            cache_ttl,
            fingerprint,
            ctx,
        };
        let result = descriptor.handler.invoke(&validated, &scope).await;
        if let Err(err) = &result {
            tracing::warn!(
                event = "tool_failed",
                tool = %name,
                error_kind = err.kind_label(),
                correlation_id = %ctx.correlation_id,
            );
        }
        result
    }
}
