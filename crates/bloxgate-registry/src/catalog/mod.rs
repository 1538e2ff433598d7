// crates/bloxgate-registry/src/catalog/mod.rs
// ============================================================================
// Module: Tool Catalog
// Description: The shipped tool set, one module per upstream domain.
// Purpose: Register every exposed tool with its schema and policy.
// Dependencies: catalog submodules
// ============================================================================

//! ## Overview
//! The catalog is data: each module registers descriptors for one upstream
//! domain. Registration order groups related tools in `list_tools`; within
//! a module, append new tools at the end to keep client-visible ordering
//! stable across releases.

use std::time::Duration;

use serde_json::json;

use crate::error::RegistryError;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::SemanticType;

mod atcfw;
mod dhcp;
mod dns;
mod federation;
mod infra;
mod insights;
mod ipam;

/// TTL for collections that change under normal operation.
pub(crate) const VOLATILE_TTL: Duration = Duration::from_secs(60);

/// Registers the complete shipped catalog.
pub(crate) fn register_all(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    ipam::register(registry)?;
    federation::register(registry)?;
    dns::register(registry)?;
    dhcp::register(registry)?;
    infra::register(registry)?;
    atcfw::register(registry)?;
    insights::register(registry)?;
    Ok(())
}

/// Standard `limit` field shared by every collection tool.
pub(crate) fn limit_field() -> FieldSpec {
    FieldSpec::with_default(
        "limit",
        SemanticType::Integer,
        json!(100),
        "Maximum number of results",
    )
}

/// Standard optional comment field shared by create/update tools.
pub(crate) fn comment_field() -> FieldSpec {
    FieldSpec::optional("comment", SemanticType::String, "Optional description")
}
