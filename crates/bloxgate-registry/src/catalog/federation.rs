// crates/bloxgate-registry/src/catalog/federation.rs
// ============================================================================
// Module: Federation Tools
// Description: Federated realm, block, and delegation tools.
// Purpose: Expose BloxOne IPAM federation to RPC clients.
// Dependencies: bloxgate-upstream, serde_json
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use bloxgate_upstream::ServiceKind;
use bloxgate_upstream::UpstreamRequest;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::catalog::VOLATILE_TTL;
use crate::catalog::comment_field;
use crate::catalog::limit_field;
use crate::context::CallScope;
use crate::descriptor::CachePolicy;
use crate::descriptor::ToolClass;
use crate::descriptor::ToolDescriptor;
use crate::descriptor::ToolHandler;
use crate::error::RegistryError;
use crate::error::ToolError;
use crate::handlers::BodyField;
use crate::handlers::CreateHandler;
use crate::handlers::FilterOp;
use crate::handlers::FilterRule;
use crate::handlers::ListHandler;
use crate::handlers::arg_str;
use crate::handlers::arg_u64;
use crate::handlers::required_str;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

const SERVICE: ServiceKind = ServiceKind::InfobloxApi;

#[allow(clippy::too_many_lines, reason = "One registration call per tool.")]
pub(crate) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolDescriptor {
        name: "list_federated_realms",
        description: "List federated realms.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match realms whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/federation/federated_realm",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_federated_realm",
        description: "Create a federated realm.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "Realm name",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/federation/federated_realm",
            fields: &[
                BodyField {
                    arg: "name",
                    target: "name",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_federated_blocks",
        description: "List federated blocks, optionally scoped to a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "realm_filter",
                SemanticType::String,
                "Restrict to one federated realm id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/federation/federated_block",
            filters: &[FilterRule {
                arg: "realm_filter",
                field: "federated_realm",
                op: FilterOp::Eq,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_federated_block",
        description: "Create a federated block in a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Block address in CIDR notation",
            ))
            .field(FieldSpec::required(
                "federated_realm",
                SemanticType::String,
                "Federated realm id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/federation/federated_block",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "federated_realm",
                    target: "federated_realm",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "allocate_next_federated_block",
        description: "Allocate the next available child block from a federated block.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "federated_block_id",
                SemanticType::String,
                "Parent federated block id",
            ))
            .field(FieldSpec::required(
                "cidr",
                SemanticType::Integer,
                "Prefix length of the allocation, e.g. 24",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(AllocateNextBlockHandler),
    })?;

    registry.register(ToolDescriptor {
        name: "list_delegations",
        description: "List delegations, optionally scoped to a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "realm_filter",
                SemanticType::String,
                "Restrict to one federated realm id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/federation/delegation",
            filters: &[FilterRule {
                arg: "realm_filter",
                field: "federated_realm",
                op: FilterOp::Eq,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_delegation",
        description: "Delegate a block to another tenant or organization.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Delegated address in CIDR notation",
            ))
            .field(FieldSpec::required(
                "federated_realm",
                SemanticType::String,
                "Federated realm id",
            ))
            .field(FieldSpec::required(
                "delegated_to",
                SemanticType::String,
                "Tenant or organization id receiving the delegation",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/federation/delegation",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "federated_realm",
                    target: "federated_realm",
                },
                BodyField {
                    arg: "delegated_to",
                    target: "delegated_to",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_overlapping_blocks",
        description: "List overlapping blocks, optionally scoped to a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "realm_filter",
                SemanticType::String,
                "Restrict to one federated realm id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/federation/overlapping_block",
            filters: &[FilterRule {
                arg: "realm_filter",
                field: "federated_realm",
                op: FilterOp::Eq,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_overlapping_block",
        description: "Create an overlapping block in a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Block address in CIDR notation",
            ))
            .field(FieldSpec::required(
                "federated_realm",
                SemanticType::String,
                "Federated realm id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/federation/overlapping_block",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "federated_realm",
                    target: "federated_realm",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_reserved_blocks",
        description: "List reserved blocks, optionally scoped to a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "realm_filter",
                SemanticType::String,
                "Restrict to one federated realm id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/federation/reserved_block",
            filters: &[FilterRule {
                arg: "realm_filter",
                field: "federated_realm",
                op: FilterOp::Eq,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_reserved_block",
        description: "Create a reserved block in a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Block address in CIDR notation",
            ))
            .field(FieldSpec::required(
                "federated_realm",
                SemanticType::String,
                "Federated realm id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/federation/reserved_block",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "federated_realm",
                    target: "federated_realm",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_forward_delegations",
        description: "List forward-looking delegations, optionally scoped to a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "realm_filter",
                SemanticType::String,
                "Restrict to one federated realm id",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/federation/forward_looking_delegation",
            filters: &[FilterRule {
                arg: "realm_filter",
                field: "federated_realm",
                op: FilterOp::Eq,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_forward_delegation",
        description: "Create a forward-looking delegation for a block not yet in use.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "address",
                SemanticType::Cidr,
                "Delegated address in CIDR notation",
            ))
            .field(FieldSpec::required(
                "federated_realm",
                SemanticType::String,
                "Federated realm id",
            ))
            .field(FieldSpec::required(
                "delegated_to",
                SemanticType::String,
                "Tenant or organization id receiving the delegation",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/federation/forward_looking_delegation",
            fields: &[
                BodyField {
                    arg: "address",
                    target: "address",
                },
                BodyField {
                    arg: "federated_realm",
                    target: "federated_realm",
                },
                BodyField {
                    arg: "delegated_to",
                    target: "delegated_to",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_federated_pools",
        description: "List federated pools, optionally by realm or name.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "realm_filter",
                SemanticType::String,
                "Restrict to one federated realm id",
            ))
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match pools whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/federation/federated_pool",
            filters: &[
                FilterRule {
                    arg: "realm_filter",
                    field: "federated_realm",
                    op: FilterOp::Eq,
                },
                FilterRule {
                    arg: "name_filter",
                    field: "name",
                    op: FilterOp::Contains,
                },
            ],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_federated_pool",
        description: "Create a federated pool in a realm.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "Pool name",
            ))
            .field(FieldSpec::required(
                "federated_realm",
                SemanticType::String,
                "Federated realm id",
            ))
            .field(comment_field()),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/federation/federated_pool",
            fields: &[
                BodyField {
                    arg: "name",
                    target: "name",
                },
                BodyField {
                    arg: "federated_realm",
                    target: "federated_realm",
                },
                BodyField {
                    arg: "comment",
                    target: "comment",
                },
            ],
            literals: &[],
        }),
    })?;

    Ok(())
}

/// Allocation against the parent block's next-available endpoint.
struct AllocateNextBlockHandler;

#[async_trait]
impl ToolHandler for AllocateNextBlockHandler {
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
        scope: &CallScope<'_>,
    ) -> Result<Value, ToolError> {
        let parent = required_str(arguments, "federated_block_id")?;
        let cidr = arg_u64(arguments, "cidr").unwrap_or(24);
        let mut body = json!({"cidr": cidr});
        if let Some(comment) = arg_str(arguments, "comment") {
            body["comment"] = json!(comment);
        }
        let path = format!(
            "/federation/federated_block/{}/next_available_federated_block",
            parent.trim_matches('/')
        );
        scope.upstream(UpstreamRequest::post(SERVICE, path, body)).await
    }
}
