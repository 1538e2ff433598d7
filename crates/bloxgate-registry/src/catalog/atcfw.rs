// crates/bloxgate-registry/src/catalog/atcfw.rs
// ============================================================================
// Module: Threat Defense Tools
// Description: Security policy, named list, and domain list tools.
// Purpose: Expose ATCFW security configuration to RPC clients.
// Dependencies: bloxgate-upstream, serde_json
// ============================================================================

use std::sync::Arc;

use bloxgate_upstream::ServiceKind;
use serde_json::json;

use crate::catalog::VOLATILE_TTL;
use crate::catalog::limit_field;
use crate::descriptor::CachePolicy;
use crate::descriptor::ToolClass;
use crate::descriptor::ToolDescriptor;
use crate::error::RegistryError;
use crate::handlers::BodyField;
use crate::handlers::CreateHandler;
use crate::handlers::FilterOp;
use crate::handlers::FilterRule;
use crate::handlers::GetHandler;
use crate::handlers::ListHandler;
use crate::registry::ToolRegistry;
use crate::schema::FieldSpec;
use crate::schema::InputSchema;
use crate::schema::SemanticType;

const SERVICE: ServiceKind = ServiceKind::AtcfwApi;

#[allow(clippy::too_many_lines, reason = "One registration call per tool.")]
pub(crate) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolDescriptor {
        name: "list_security_policies",
        description: "List Threat Defense security policies.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match policies whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/security_policies",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "get_security_policy",
        description: "Fetch one security policy by id.",
        schema: InputSchema::new().field(FieldSpec::required(
            "policy_id",
            SemanticType::String,
            "Security policy id",
        )),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(GetHandler {
            service: SERVICE,
            path: "/security_policies",
            id_arg: "policy_id",
            label: "security policy",
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_threat_named_lists",
        description: "List custom threat indicator named lists.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match lists whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/named_lists",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_threat_named_list",
        description: "Create a custom named list of threat indicators.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "List name",
            ))
            .field(FieldSpec::with_default(
                "type",
                SemanticType::String,
                json!("custom_list"),
                "Named list type",
            ))
            .field(FieldSpec::optional(
                "items",
                SemanticType::Sequence(Box::new(SemanticType::String)),
                "Indicator values, e.g. domains",
            ))
            .field(FieldSpec::optional(
                "description",
                SemanticType::String,
                "Optional description",
            )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/named_lists",
            fields: &[
                BodyField {
                    arg: "name",
                    target: "name",
                },
                BodyField {
                    arg: "type",
                    target: "type",
                },
                BodyField {
                    arg: "items",
                    target: "items",
                },
                BodyField {
                    arg: "description",
                    target: "description",
                },
            ],
            literals: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_content_categories",
        description: "List content filtering categories.",
        schema: InputSchema::new(),
        cache: CachePolicy::Ttl(None),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/content_categories",
            filters: &[],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "list_internal_domains",
        description: "List internal domain lists excluded from filtering.",
        schema: InputSchema::new()
            .field(FieldSpec::optional(
                "name_filter",
                SemanticType::String,
                "Match lists whose name contains this value",
            ))
            .field(limit_field()),
        cache: CachePolicy::Ttl(Some(VOLATILE_TTL)),
        class: ToolClass::Read,
        handler: Arc::new(ListHandler {
            service: SERVICE,
            path: "/internal_domain_lists",
            filters: &[FilterRule {
                arg: "name_filter",
                field: "name",
                op: FilterOp::Contains,
            }],
            query_args: &[],
        }),
    })?;

    registry.register(ToolDescriptor {
        name: "create_internal_domain_list",
        description: "Create an internal domain list.",
        schema: InputSchema::new()
            .field(FieldSpec::required(
                "name",
                SemanticType::String,
                "List name",
            ))
            .field(FieldSpec::required(
                "internal_domains",
                SemanticType::Sequence(Box::new(SemanticType::String)),
                "Domains treated as internal",
            ))
            .field(FieldSpec::optional(
                "description",
                SemanticType::String,
                "Optional description",
            )),
        cache: CachePolicy::None,
        class: ToolClass::Mutate,
        handler: Arc::new(CreateHandler {
            service: SERVICE,
            path: "/internal_domain_lists",
            fields: &[
                BodyField {
                    arg: "name",
                    target: "name",
                },
                BodyField {
                    arg: "internal_domains",
                    target: "internal_domains",
                },
                BodyField {
                    arg: "description",
                    target: "description",
                },
            ],
            literals: &[],
        }),
    })?;

    Ok(())
}
