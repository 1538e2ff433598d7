// crates/bloxgate-registry/src/descriptor.rs
// ============================================================================
// Module: Tool Descriptors
// Description: Immutable per-tool binding of schema, policy, and handler.
// Purpose: Make cache policy and classification data, not code.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! A descriptor is created at startup and never mutated. Cache policy lives
//! here as data; the pipeline applies it uniformly, so no handler wraps
//! itself in caching logic. Mutations are classified and always bypass the
//! cache regardless of their declared policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::context::CallScope;
use crate::error::ToolError;
use crate::schema::InputSchema;

/// Cache policy declared on a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Never cached.
    None,
    /// Cached with a TTL; `None` takes the configured default.
    Ttl(Option<Duration>),
}

/// Tool classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    /// Mutation-free; may declare a TTL policy.
    Read,
    /// Mutates upstream state; always bypasses the cache.
    Mutate,
}

/// Handler seam: a pure function of validated arguments and call scope.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Executes the tool against the upstream.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for semantic and upstream failures.
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError>;
}

/// Immutable binding of one exposed tool.
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: &'static str,
    /// Human description published to clients.
    pub description: &'static str,
    /// Declared input schema.
    pub schema: InputSchema,
    /// Cache policy; only honored for `Read` tools.
    pub cache: CachePolicy,
    /// Read/mutate classification.
    pub class: ToolClass,
    /// Handler invoked after validation.
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    /// Resolves the effective TTL for this tool.
    ///
    /// Mutations always resolve to no caching, whatever they declare.
    #[must_use]
    pub fn effective_ttl(&self, default_ttl: Duration) -> Option<Duration> {
        if self.class == ToolClass::Mutate {
            return None;
        }
        match self.cache {
            CachePolicy::None => None,
            CachePolicy::Ttl(explicit) => Some(explicit.unwrap_or(default_ttl)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Map;
    use serde_json::Value;
    use serde_json::json;

    use super::*;
    use crate::context::CallScope;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn invoke(
            &self,
            _arguments: &Map<String, Value>,
            _scope: &CallScope<'_>,
        ) -> Result<Value, ToolError> {
            Ok(json!({}))
        }
    }

    fn descriptor(class: ToolClass, cache: CachePolicy) -> ToolDescriptor {
        ToolDescriptor {
            name: "probe",
            description: "test",
            schema: InputSchema::new(),
            cache,
            class,
            handler: Arc::new(EchoHandler),
        }
    }

    #[test]
    fn mutations_never_resolve_a_ttl() {
        let d = descriptor(ToolClass::Mutate, CachePolicy::Ttl(Some(Duration::from_secs(60))));
        assert_eq!(d.effective_ttl(Duration::from_secs(300)), None);
    }

    #[test]
    fn declared_ttl_wins_over_default() {
        let d = descriptor(ToolClass::Read, CachePolicy::Ttl(Some(Duration::from_secs(60))));
        assert_eq!(d.effective_ttl(Duration::from_secs(300)), Some(Duration::from_secs(60)));
        let d = descriptor(ToolClass::Read, CachePolicy::Ttl(None));
        assert_eq!(d.effective_ttl(Duration::from_secs(300)), Some(Duration::from_secs(300)));
        let d = descriptor(ToolClass::Read, CachePolicy::None);
        assert_eq!(d.effective_ttl(Duration::from_secs(300)), None);
    }
}
